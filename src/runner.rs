use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::cli::{Cli, Command, ConfigCommand, FolderArgs, UserArgs};
use crate::client::{DryRunApi, HttpApi, RemoteApi};
use crate::config::{self, Overrides, SeedConfig, SeedFile};
use crate::output::RowWriter;
use crate::users::{Membership, UserRecord};
use crate::{envfile, folders, users};

const CONFIG_DIR: &str = ".seed";
const CONFIG_FILE: &str = "config.toml";
const FOLDERS_OUTPUT: &str = "folders.csv";
const USERS_OUTPUT: &str = "users.csv";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ConfigPathSource {
    Explicit,
    Discovered,
    HomeDefault,
}

impl ConfigPathSource {
    fn as_str(&self) -> &'static str {
        match self {
            ConfigPathSource::Explicit => "explicit",
            ConfigPathSource::Discovered => "discovered",
            ConfigPathSource::HomeDefault => "home-default",
        }
    }
}

#[derive(Clone, Debug)]
struct ResolvedConfigPath {
    path: Utf8PathBuf,
    source: ConfigPathSource,
}

pub fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::from(&cli);
    ctx.apply_chdir()?;

    match cli.command {
        Command::Config { command } => handle_config(&ctx, command),
        Command::Folders(args) => handle_folders(&AppState::new(ctx)?, args),
        Command::Users(args) => handle_users(&AppState::new(ctx)?, args),
        Command::DeleteUser { name } => handle_delete_user(&AppState::new(ctx)?, &name),
    }
}

fn handle_folders(state: &AppState, args: FolderArgs) -> Result<()> {
    let (count, output) = folder_settings(&args, &state.file)?;
    let api = state.api()?;
    info!(count, output = %output, base_url = %state.seed.base_url, "seeding folders");

    let mut out = RowWriter::create(&output)?;
    let tally = folders::seed(api.as_ref(), count, args.strict, &mut out)?;

    println!(
        "Sent {} folder requests ({} not accepted); wrote {} rows to {}",
        tally.requests,
        tally.failures,
        out.rows(),
        output
    );
    Ok(())
}

fn handle_users(state: &AppState, args: UserArgs) -> Result<()> {
    let settings = user_settings(&args, &state.file)?;
    let api = state.api()?;
    info!(
        count = settings.count,
        output = %settings.output,
        base_url = %state.seed.base_url,
        "seeding users"
    );

    let records = users::build_users(settings.count, &settings.prefix, &settings.last_name);
    let mut out = RowWriter::create(&settings.output)?;
    let tally = users::seed(
        api.as_ref(),
        &records,
        &settings.membership,
        args.strict,
        &mut out,
    )?;

    println!(
        "Sent {} user requests ({} not accepted); wrote {} rows to {}",
        tally.requests,
        tally.failures,
        out.rows(),
        settings.output
    );
    Ok(())
}

fn handle_delete_user(state: &AppState, name: &str) -> Result<()> {
    let api = state.api()?;
    let record = UserRecord::new(name, users::DEFAULT_LAST_NAME);
    let outcome = users::delete(api.as_ref(), &record)?;
    println!("{}", outcome);
    if !outcome.is_success() {
        println!("Server did not accept deletion of `{}`.", record.username());
    }
    Ok(())
}

fn handle_config(ctx: &CliContext, command: Option<ConfigCommand>) -> Result<()> {
    let resolved = ctx.resolve_config_path()?;
    match command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => {
            if !resolved.path.exists() {
                println!(
                    "No config file at {} ({}); using environment only.",
                    resolved.path,
                    resolved.source.as_str()
                );
                return Ok(());
            }
            let file = config::load_from_path(&resolved.path)?;
            println!(
                "Config loaded from {} ({})",
                resolved.path,
                resolved.source.as_str()
            );
            print!("{}", config::format_summary(&file));
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{} ({})", resolved.path, resolved.source.as_str());
            Ok(())
        }
        ConfigCommand::Generate { path, force } => {
            let target = match path {
                Some(path) => to_utf8(path)?,
                None => resolved.path,
            };
            config::write_example_config(&target, force)?;
            println!("Wrote example config to {}", target);
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            config::set_value(&resolved.path, &key, &value)?;
            println!("Set `{}` in {}", key, resolved.path);
            Ok(())
        }
    }
}

fn folder_settings(args: &FolderArgs, file: &SeedFile) -> Result<(usize, Utf8PathBuf)> {
    let defaults = file.folders.as_ref();
    let count = args
        .count
        .or_else(|| defaults.and_then(|d| d.count))
        .unwrap_or(folders::DEFAULT_COUNT);
    let output = output_path(
        args.output.clone(),
        defaults.and_then(|d| d.output.as_deref()),
        FOLDERS_OUTPUT,
    )?;
    Ok((count, output))
}

#[derive(Debug)]
struct UserSettings {
    count: usize,
    prefix: String,
    last_name: String,
    membership: Membership,
    output: Utf8PathBuf,
}

fn user_settings(args: &UserArgs, file: &SeedFile) -> Result<UserSettings> {
    let defaults = file.users.as_ref();
    let site = if args.no_site {
        None
    } else {
        args.site
            .clone()
            .or_else(|| defaults.and_then(|d| d.site.clone()))
            .or_else(|| Some(users::DEFAULT_SITE.to_owned()))
            .filter(|site| !site.is_empty())
    };

    Ok(UserSettings {
        count: args
            .count
            .or_else(|| defaults.and_then(|d| d.count))
            .unwrap_or(users::DEFAULT_COUNT),
        prefix: args
            .prefix
            .clone()
            .or_else(|| defaults.and_then(|d| d.prefix.clone()))
            .unwrap_or_else(|| users::DEFAULT_PREFIX.to_owned()),
        last_name: args
            .last_name
            .clone()
            .or_else(|| defaults.and_then(|d| d.last_name.clone()))
            .unwrap_or_else(|| users::DEFAULT_LAST_NAME.to_owned()),
        membership: Membership {
            site,
            group: args
                .group
                .clone()
                .or_else(|| defaults.and_then(|d| d.group.clone()))
                .unwrap_or_else(|| users::DEFAULT_GROUP.to_owned()),
        },
        output: output_path(
            args.output.clone(),
            defaults.and_then(|d| d.output.as_deref()),
            USERS_OUTPUT,
        )?,
    })
}

fn output_path(flag: Option<PathBuf>, configured: Option<&str>, fallback: &str) -> Result<Utf8PathBuf> {
    match flag {
        Some(path) => to_utf8(path),
        None => Ok(Utf8PathBuf::from(configured.unwrap_or(fallback))),
    }
}

fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|_| anyhow!("path must be valid UTF-8"))
}

struct CliContext {
    chdir: Option<PathBuf>,
    file: Option<PathBuf>,
    overrides: Overrides,
    dry_run: bool,
}

impl CliContext {
    fn apply_chdir(&self) -> Result<()> {
        if let Some(path) = &self.chdir {
            std::env::set_current_dir(path)
                .with_context(|| format!("changing directory to {}", path.display()))?;
        }
        Ok(())
    }

    fn resolve_config_path(&self) -> Result<ResolvedConfigPath> {
        let cwd = envfile::current_working_dir()?;
        let home = dirs::home_dir()
            .map(Utf8PathBuf::from_path_buf)
            .transpose()
            .map_err(|_| anyhow!("home directory must be valid UTF-8"))?;
        self.resolve_config_path_from(&cwd, home.as_deref())
    }

    fn resolve_config_path_from(
        &self,
        start: &Utf8Path,
        home: Option<&Utf8Path>,
    ) -> Result<ResolvedConfigPath> {
        if let Some(path) = &self.file {
            return Ok(ResolvedConfigPath {
                path: to_utf8(path.clone())?,
                source: ConfigPathSource::Explicit,
            });
        }

        let mut current = Some(start);
        while let Some(dir) = current {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if candidate.exists() {
                return Ok(ResolvedConfigPath {
                    path: candidate,
                    source: ConfigPathSource::Discovered,
                });
            }
            current = dir.parent();
        }

        let home = home.ok_or_else(|| anyhow!("unable to determine home directory"))?;
        Ok(ResolvedConfigPath {
            path: home.join(CONFIG_DIR).join(CONFIG_FILE),
            source: ConfigPathSource::HomeDefault,
        })
    }
}

impl From<&Cli> for CliContext {
    fn from(cli: &Cli) -> Self {
        Self {
            chdir: cli.chdir.clone(),
            file: cli.file.clone(),
            overrides: Overrides {
                base_url: cli.base_url.clone(),
                admin_user: cli.admin_user.clone(),
                admin_pwd: cli.admin_pwd.clone(),
            },
            dry_run: cli.dry_run,
        }
    }
}

struct AppState {
    ctx: CliContext,
    file: SeedFile,
    seed: SeedConfig,
}

impl AppState {
    fn new(ctx: CliContext) -> Result<Self> {
        let resolved = ctx.resolve_config_path()?;
        let file = match resolved.source {
            ConfigPathSource::Explicit => config::load_from_path(&resolved.path)?,
            _ => config::load_or_default(&resolved.path)?,
        };
        debug!(path = %resolved.path, source = resolved.source.as_str(), "config resolved");

        let cwd = envfile::current_working_dir()?;
        let env_file = match envfile::locate(&cwd) {
            Some(path) => envfile::EnvFile::load(&path)?,
            None => envfile::EnvFile::default(),
        };
        if let Some(path) = env_file.path() {
            debug!(path = %path, "using .env file");
        }

        let seed = config::resolve(
            &ctx.overrides,
            |key| std::env::var(key).ok(),
            &env_file,
            &file,
        )?;
        Ok(Self { ctx, file, seed })
    }

    fn api(&self) -> Result<Box<dyn RemoteApi>> {
        if self.ctx.dry_run {
            return Ok(Box::new(DryRunApi::new(&self.seed)));
        }
        Ok(Box::new(HttpApi::new(&self.seed)?))
    }
}
