use crate::{
    collector::Dataset,
    error::ReportError,
    freshness::{current_filesets, current_hosts, last_date},
    value::Value,
};
use itertools::Itertools;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;

pub fn to_gib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GIB
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineLine {
    pub name: String,
    /// Volume in GiB for each date of the timeline, `None` for gaps.
    pub points: Vec<Option<f64>>,
    pub link: Option<String>,
}

/// Volume evolution of a set of sibling nodes over every date any of them has.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub title: String,
    pub dates: Vec<String>,
    pub lines: Vec<TimelineLine>,
}

impl Timeline {
    /// `link_dir` points each line at `../<link_dir>/<name>.html`.
    pub fn build<'a, I>(name: &str, items: I, link_dir: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let items: Vec<(&str, &Value)> = items.into_iter().collect();
        let dates: Vec<String> = items
            .iter()
            .flat_map(|(_, node)| node.total().into_iter().flat_map(|series| series.keys()))
            .cloned()
            .sorted()
            .dedup()
            .collect();

        let lines = items
            .iter()
            .map(|(item, node)| TimelineLine {
                name: item.to_string(),
                points: dates
                    .iter()
                    .map(|date| node.total().and_then(|series| series.get(date)).map(|b| to_gib(*b)))
                    .collect(),
                link: link_dir.map(|dir| format!("../{}/{}.html", dir, file_stem(item))),
            })
            .collect();

        Self {
            title: format!("{} volume usage evolution", name),
            dates,
            lines,
        }
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = write!(html, "<table class=\"timeline\">\n<caption>{}</caption>\n<thead><tr><th>Date</th>", escape(&self.title));
        for line in &self.lines {
            match &line.link {
                Some(link) => {
                    let _ = write!(html, "<th><a href=\"{}\">{}</a></th>", escape(link), escape(&line.name));
                }
                None => {
                    let _ = write!(html, "<th>{}</th>", escape(&line.name));
                }
            }
        }
        html.push_str("</tr></thead>\n<tbody>\n");
        for (index, date) in self.dates.iter().enumerate() {
            let _ = write!(html, "<tr><td>{}</td>", escape(date));
            for line in &self.lines {
                match line.points[index] {
                    Some(gib) => {
                        let _ = write!(html, "<td>{:.2}</td>", gib);
                    }
                    None => html.push_str("<td></td>"),
                }
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</tbody>\n</table>\n");
        html
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreemapTile {
    pub fileset: String,
    pub gib: f64,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreemapGroup {
    pub host: String,
    pub tiles: Vec<TreemapTile>,
}

/// Current volume split of a client by host and fileset.
///
/// Only hosts backed up on the client's last backup date appear, and under
/// them only filesets backed up on the host's last backup date.
#[derive(Debug, Clone, PartialEq)]
pub struct Treemap {
    pub title: String,
    pub groups: Vec<TreemapGroup>,
}

impl Treemap {
    pub fn build(name: &str, client: &Value) -> Self {
        let groups = current_hosts(client)
            .into_iter()
            .map(|(host, host_node)| TreemapGroup {
                host: host.to_string(),
                tiles: current_filesets(host_node)
                    .into_iter()
                    .map(|(fileset, node)| TreemapTile {
                        fileset: fileset.to_string(),
                        gib: to_gib(last_date(node).map(|d| node.volume_at(d)).unwrap_or(0)),
                        link: format!("../../timelines/hosts/{}.html", file_stem(host)),
                    })
                    .collect(),
            })
            .collect();

        Self {
            title: format!("{} volume usage repartition", name),
            groups,
        }
    }

    pub fn total_gib(&self) -> f64 {
        self.groups.iter().flat_map(|g| &g.tiles).map(|t| t.gib).sum()
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<table class=\"treemap\">\n<caption>{}</caption>\n<thead><tr><th>Host</th><th>Fileset</th><th>Volume (GiB)</th></tr></thead>\n<tbody>\n",
            escape(&self.title)
        );
        for group in &self.groups {
            for tile in &group.tiles {
                let _ = write!(
                    html,
                    "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>{:.2}</td></tr>\n",
                    escape(&group.host),
                    escape(&tile.link),
                    escape(&tile.fileset),
                    tile.gib
                );
            }
        }
        let _ = write!(
            html,
            "</tbody>\n<tfoot><tr><th colspan=\"2\">Total</th><th>{:.2}</th></tr></tfoot>\n</table>\n",
            self.total_gib()
        );
        html
    }
}

/// Writes the HTML report tree under an output directory.
pub struct ReportWriter {
    root: PathBuf,
}

impl ReportWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn timeline_path(&self, dir: &str, name: &str) -> PathBuf {
        self.root
            .join("html")
            .join("timelines")
            .join(dir)
            .join(format!("{}.html", file_stem(name)))
    }

    pub fn treemap_path(&self, client: &str) -> PathBuf {
        self.root
            .join("html")
            .join("reports")
            .join("clients")
            .join(format!("{}.html", file_stem(client)))
    }

    /// Render every page of `dataset`, returning how many were written.
    pub fn render(&self, dataset: &Dataset) -> Result<usize, ReportError> {
        let mut pages = 0;
        let clients = || dataset.clients.iter().map(|(name, node)| (name.as_str(), node));

        tracing::info!("Rendering timelines for {} clients", dataset.clients.len());
        self.write_timeline("clients", "all_clients", &Timeline::build("all_clients", clients(), Some("clients")))?;
        pages += 1;
        for (client, node) in clients() {
            let total_name = format!("{}_total", client);
            self.write_timeline("clients", &total_name, &Timeline::build(&total_name, [(client, node)], Some("clients")))?;
            self.write_timeline("clients", client, &Timeline::build(client, node.hosts(), Some("hosts")))?;
            pages += 2;
            for (host, host_node) in node.hosts() {
                self.write_timeline("hosts", host, &Timeline::build(host, host_node.filesets(), None))?;
                pages += 1;
            }
        }

        tracing::info!("Rendering treemaps for {} clients", dataset.clients.len());
        for (client, node) in clients() {
            let treemap = Treemap::build(client, node);
            write_page(&self.treemap_path(client), &treemap.title, &treemap.to_html())?;
            pages += 1;
        }

        write_page(&self.root.join("index.html"), "Backup volumes", &self.index_body(dataset))?;
        write_page(&self.root.join("nodata.html"), "Clients without data", &nodata_body(&dataset.nodata))?;
        pages += 2;
        Ok(pages)
    }

    fn write_timeline(&self, dir: &str, name: &str, timeline: &Timeline) -> Result<(), ReportError> {
        write_page(&self.timeline_path(dir, name), &timeline.title, &timeline.to_html())
    }

    fn index_body(&self, dataset: &Dataset) -> String {
        let mut html = String::new();
        html.push_str("<p><a href=\"html/timelines/clients/all_clients.html\">All clients</a> | <a href=\"nodata.html\">Clients without data</a></p>\n");
        html.push_str("<table class=\"clients\">\n<thead><tr><th>Client</th><th>Instances</th><th>Last backup</th><th>Volume (GiB)</th><th>Repartition</th></tr></thead>\n<tbody>\n");
        for (client, node) in &dataset.clients {
            let last = last_date(node);
            let _ = write!(
                html,
                "<tr><td><a href=\"html/timelines/clients/{stem}.html\">{name}</a></td><td>{instances}</td><td>{last}</td><td>{gib:.2}</td><td><a href=\"html/reports/clients/{stem}.html\">treemap</a></td></tr>\n",
                stem = escape(&file_stem(client)),
                name = escape(client),
                instances = escape(&node.instances().join(", ")),
                last = escape(last.unwrap_or("never")),
                gib = to_gib(last.map(|d| node.volume_at(d)).unwrap_or(0)),
            );
        }
        let total = dataset.total();
        let _ = write!(
            html,
            "</tbody>\n<tfoot><tr><th colspan=\"3\">Total ({} instances)</th><th>{:.2}</th><th></th></tr></tfoot>\n</table>\n",
            dataset.instances().len(),
            to_gib(total.values().next_back().copied().unwrap_or(0))
        );
        html
    }
}

fn nodata_body(nodata: &[String]) -> String {
    if nodata.is_empty() {
        return "<p>Every client has data.</p>\n".to_string();
    }
    let mut html = String::from("<ul class=\"nodata\">\n");
    for client in nodata {
        let _ = writeln!(html, "<li>{}</li>", escape(client));
    }
    html.push_str("</ul>\n");
    html
}

fn write_page(path: &Path, title: &str, body: &str) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n{}</body>\n</html>\n",
        escape(title),
        escape(title),
        body
    );
    fs::write(path, page)?;
    Ok(())
}

fn file_stem(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
