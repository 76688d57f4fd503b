//! Render documents with resolved config values.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::common::{CommandContext, InputArgs};
use crate::config::Settings;
use crate::core::file_error::{read_to_string, write_file};

/// Render each file through both template passes.
///
/// Without `--out-dir` the rendered documents are printed to stdout,
/// separated by `---`. With it, each is written under its file name.
///
/// # Examples
///
/// ```bash
/// kots-render render --config config.yaml deployment.yaml service.yaml
/// kots-render render --config config.yaml --values values.yaml --out-dir rendered/ manifests/*.yaml
/// ```
#[derive(Args, Debug)]
pub struct RenderCommand {
    #[command(flatten)]
    inputs: InputArgs,

    /// Directory to write rendered files into
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Documents to render
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,
}

impl RenderCommand {
    pub fn execute(self, settings: Settings) -> Result<()> {
        let ctx = CommandContext::load(&self.inputs, settings)?;
        let resolver = ctx.resolver()?;
        let values = ctx.resolve(&resolver)?;
        let builder = resolver.builder(values);

        let mut printed = 0;
        for file in &self.files {
            let name = file.file_name().map_or_else(
                || file.display().to_string(),
                |n| n.to_string_lossy().into_owned(),
            );
            let content = read_to_string(file, "document to render")?;
            let rendered = builder
                .render_template(&name, &content)
                .with_context(|| format!("Failed to render {}", file.display()))?;

            match &self.out_dir {
                Some(dir) => {
                    let target = dir.join(&name);
                    write_file(&target, &rendered, "rendered document")?;
                    tracing::info!("Rendered {} -> {}", file.display(), target.display());
                }
                None => {
                    if printed > 0 {
                        println!("---");
                    }
                    print!("{rendered}");
                    if !rendered.ends_with('\n') {
                        println!();
                    }
                    printed += 1;
                }
            }
        }
        Ok(())
    }
}
