use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Args;

use cutover_core::CutoverConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Cloud Run service name.
    #[arg(long)]
    pub service: String,
    /// Cloud Run region.
    #[arg(long)]
    pub region: String,
    /// GCP project. Also seeds an Artifact Registry [image] section.
    #[arg(long)]
    pub project: Option<String>,
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, path: &Path) -> Result<ExitCode> {
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let config = CutoverConfig::scaffold(&args.service, &args.region, args.project.as_deref());
    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("✓ Generated {}", path.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(force: bool) -> InitArgs {
        InitArgs {
            service: "sre-demo".into(),
            region: "asia-northeast1".into(),
            project: Some("proj".into()),
            force,
        }
    }

    #[test]
    fn scaffold_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cutover.toml");
        run(args(false), &path).unwrap();

        let config = CutoverConfig::from_file(&path).unwrap();
        assert_eq!(config.service.name, "sre-demo");
        assert_eq!(config.probe.path, "/health");
        assert!(config.image.is_some());
    }

    #[test]
    fn refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cutover.toml");
        std::fs::write(&path, "keep me").unwrap();

        assert!(run(args(false), &path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");
        run(args(true), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("sre-demo"));
    }
}
