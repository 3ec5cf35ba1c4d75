//! Minimal HTML report: a header, titled sections of markup, and Plotly charts.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub struct ReportSection {
    title: String,
    blocks: Vec<Markup>,
    plot_count: usize,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            blocks: Vec::new(),
            plot_count: 0,
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.blocks.push(content);
    }

    /// Embed a chart; the page loads plotly.js once in its head.
    pub fn add_plot(&mut self, plot: Plot) {
        let id = format!(
            "plot-{}-{}",
            self.title
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
                .collect::<String>(),
            self.plot_count
        );
        self.plot_count += 1;
        self.blocks.push(PreEscaped(plot.to_inline_html(Some(&id))));
    }

    fn render(&self) -> Markup {
        html! {
            section {
                h2 { (self.title) }
                @for block in &self.blocks {
                    div class="block" { (block) }
                }
            }
        }
    }
}

pub struct Report {
    software_name: String,
    version: String,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(software_name: &str, version: &str, title: &str) -> Self {
        Report {
            software_name: software_name.to_string(),
            version: version.to_string(),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> Markup {
        let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em; color: #222; }
                        table { border-collapse: collapse; margin: 1em 0; }
                        th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
                        th:first-child, td:first-child { text-align: left; }
                        .meta { color: #666; font-size: 0.9em; }"
                    }
                }
                body {
                    h1 { (self.title) }
                    p class="meta" {
                        (self.software_name) " v" (self.version) " | generated " (generated)
                    }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.render().into_string())
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        log::info!("Report saved to {}", path.display());
        Ok(())
    }
}
