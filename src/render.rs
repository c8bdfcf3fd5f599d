use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use minijinja::{context, Environment, ErrorKind, Template};
use serde::Serialize;
use tracing::debug;

use crate::error::PipelineError;
use crate::site::{SiteData, ALL_STATES};

const TEMPLATES: [&str; 5] = ["page", "index", "state", "bank", "base"];

pub struct RenderCounts {
    pub pages: usize,
    pub states: usize,
    pub banks: usize,
}

/// Renders named templates into the output tree.
pub struct Renderer {
    env: Environment<'static>,
    output_dir: PathBuf,
}

impl Renderer {
    /// Fails up front if any of the required templates is missing.
    pub fn new(templates_dir: &Path, output_dir: &Path) -> Result<Self> {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(templates_dir));
        let renderer = Renderer { env, output_dir: output_dir.to_path_buf() };
        for name in TEMPLATES {
            renderer.template(name)?;
        }
        Ok(renderer)
    }

    fn template(&self, name: &str) -> Result<Template<'_, '_>> {
        let file = format!("{}.html", name);
        self.env.get_template(&file).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => {
                PipelineError::MissingTemplate { name: file.clone() }.into()
            }
            _ => anyhow::Error::new(e).context(format!("Failed to load template {}", file)),
        })
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        self.template(name)?
            .render(ctx)
            .with_context(|| format!("Failed to render template {}.html", name))
    }

    pub fn render_all(&self, data: &SiteData) -> Result<RenderCounts> {
        let banks_dir = self.output_dir.join("banks");
        let states_dir = self.output_dir.join("states");
        for dir in [&self.output_dir, &banks_dir, &states_dir] {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }

        self.render_index(data)?;
        self.render_page("all.html", "All Banks")?;
        self.render_page("timeline.html", "Timeline")?;
        let states = self.render_states(data, &states_dir)?;
        let banks = self.render_banks(data, &banks_dir)?;

        Ok(RenderCounts { pages: 3, states, banks })
    }

    fn render_index(&self, data: &SiteData) -> Result<()> {
        // single column, kept as a list of columns for multi-column layouts
        let columns = vec![data.index_listing()];
        let html = self.render(
            "index",
            context! {
                title => "Home",
                root => "",
                state_counts => &data.state_counts,
                state_pages => &ALL_STATES[..],
                columns => columns,
            },
        )?;
        save_html(&self.output_dir.join("index.html"), &html)
    }

    fn render_page(&self, file: &str, title: &str) -> Result<()> {
        let html = self.render("page", context! { title => title, root => "" })?;
        save_html(&self.output_dir.join(file), &html)
    }

    fn render_states(&self, data: &SiteData, dir: &Path) -> Result<usize> {
        for state in ALL_STATES {
            let html = self.render(
                "state",
                context! {
                    title => format!("State: {}", state),
                    root => "../",
                    state => state,
                    banks => data.banks_in(state),
                },
            )?;
            save_html(&dir.join(format!("{}.html", state)), &html)?;
        }
        Ok(ALL_STATES.len())
    }

    fn render_banks(&self, data: &SiteData, dir: &Path) -> Result<usize> {
        let pb = ProgressBar::new(data.banks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} bank pages")?
                .progress_chars("=> "),
        );

        for bank in &data.banks {
            let html = self.render(
                "bank",
                context! {
                    title => format!("Bank: {}", bank.record.name),
                    root => "../",
                    bank => &bank.record,
                },
            )?;
            save_html(&dir.join(bank.file_name()), &html)?;
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(data.banks.len())
    }
}

/// Replace whatever is at `path` with `html`.
pub fn save_html(path: &Path, html: &str) -> Result<()> {
    if path.is_file() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {:?}", path))?;
    }
    fs::write(path, html).with_context(|| format!("Failed to write {:?}", path))?;
    debug!("Generated {:?}", path);
    Ok(())
}
