use std::path::Path;

use anyhow::Context;
use rx_core::config::Config;

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn path(explicit: Option<&Path>) {
    match explicit {
        Some(p) => println!("{}", p.display()),
        None => println!("{}", Config::default_path().display()),
    }
}

/// Write the default configuration, refusing to clobber an existing file
/// unless `force` is set.
pub fn init(explicit: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_path);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(&path, Config::default().to_toml()?)
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
