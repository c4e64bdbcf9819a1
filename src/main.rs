mod config;
mod error;
mod executor;
mod host;
mod icons;
mod model;
mod params;
mod sources;
mod state;
mod terminal;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use crate::config::{Config, load_config};
use crate::executor::{SystemMounter, launch};
use crate::host::HeadlessHost;
use crate::icons::{Skin, SkinDirs};
use crate::model::Link;
use crate::params::Selection;
use crate::sources::Source;
use crate::sources::apps::AppsSource;
use crate::sources::linkfile::{ARCHIVE_OWNED_KEYS, load_link_file};
use crate::sources::opk::load_opk_file;
use crate::sources::sections::SectionSource;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file to use instead of the default one
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Launch a link, handing the terminal over unless it is a daemon link
    Launch {
        link: PathBuf,
        /// LINK is a package archive
        #[arg(long)]
        opk: bool,
        /// Selected file substituted into the link's parameters
        #[arg(long)]
        file: Option<String>,
        /// Directory the file was selected from
        #[arg(long, requires = "file")]
        dir: Option<String>,
    },
    /// Print a link's fields
    Show {
        link: PathBuf,
        #[arg(long)]
        opk: bool,
    },
    /// Edit a link and save it
    Set {
        link: PathBuf,
        #[arg(long)]
        opk: bool,
        /// key=value pairs using the descriptor's key names
        #[arg(required = true)]
        settings: Vec<String>,
    },
    /// List the links of all sections and package directories
    List,
    /// Launch again what was launched last
    Relaunch,
}

fn load_link(path: &Path, opk: bool, config: &Config, skin: &dyn Skin) -> Result<Link> {
    if opk {
        let (link, _) = load_opk_file(path, config, skin)?;
        Ok(link)
    } else {
        let (link, _) = load_link_file(path, skin);
        Ok(link)
    }
}

fn run(link: &mut Link, path: &Path, opk: bool, selection: Option<&Selection>, config: &Config) -> Result<()> {
    let mut host = HeadlessHost::new(
        config,
        path.to_path_buf(),
        opk,
        state::state_path(),
        state::tmp_path(),
    );

    let status = launch(link, selection, config, &mut host, &SystemMounter)?;
    if !status.success() {
        process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}

fn show(link: &Link) {
    println!("file:             {}", link.file().display());
    if let Some(category) = link.category() {
        println!("category:         {}", category);
    }
    println!("title:            {}", link.title());
    println!("description:      {}", link.description());
    println!("icon:             {} ({})", link.icon(), link.icon_path());
    if link.is_archive() || link.target_exists() {
        println!("exec:             {}", link.exec());
    } else {
        println!("exec:             {} (missing)", link.exec());
    }
    println!("params:           {}", link.params());
    println!("manual:           {}", link.manual());
    println!("clock:            {}", link.clock());
    println!("dontleave:        {}", link.dont_leave());
    println!("consoleapp:       {}", link.console_app());
    println!("selectordir:      {}", link.selector_dir());
    println!("selectorfilter:   {}", link.selector_filter());
    println!("selectorscreens:  {}", link.selector_screens());
    println!("selectoraliases:  {}", link.alias_file());
    println!("selectorbrowser:  {}", link.selector_browser());
    println!("editable:         {}", link.is_editable());
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let skin = SkinDirs::from_config(&config);

    match args.command {
        Cmd::Launch { link: path, opk, file, dir } => {
            let mut link = load_link(&path, opk, &config, &skin)?;
            let selection = file.filter(|f| !f.is_empty()).map(|f| Selection::new(f, dir));
            run(&mut link, &path, opk, selection.as_ref(), &config)?;
        }
        Cmd::Show { link: path, opk } => {
            let link = load_link(&path, opk, &config, &skin)?;
            show(&link);
        }
        Cmd::Set { link: path, opk, settings } => {
            let mut link = load_link(&path, opk, &config, &skin)?;
            for setting in &settings {
                let Some((key, value)) = setting.split_once('=') else {
                    bail!("expected key=value, got '{}'", setting);
                };
                let key = key.trim();
                if !link.is_editable() && !link.is_archive() && ARCHIVE_OWNED_KEYS.contains(&key) {
                    bail!("'{}' is not editable", key);
                }
                link.set(key, value.trim(), &skin)?;
            }
            if !link.save() {
                bail!("unable to save {}", link.file().display());
            }
            show(&link);
        }
        Cmd::List => {
            let mut links = SectionSource::new(config.sections_dir(), &skin).scan()?;
            links.extend(AppsSource::new(&config, &skin).scan()?);
            for link in &links {
                println!("{}\t{}\t{}", link.title(), link.exec(), link.icon_path());
            }
        }
        Cmd::Relaunch => {
            let last = state::load_state(&state::tmp_path());
            let Some(path) = last.link.clone() else {
                bail!("nothing was launched yet");
            };
            let mut link = load_link(&path, last.archive, &config, &skin)?;
            run(&mut link, &path, last.archive, last.selection().as_ref(), &config)?;
        }
    }

    Ok(())
}
