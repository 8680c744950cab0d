use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "seed",
    version,
    about = "Seed folders and users into a content server before a load test"
)]
pub struct Cli {
    #[arg(short = 'C', long = "chdir")]
    pub chdir: Option<PathBuf>,
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,
    /// Server root, e.g. `http://localhost:8080` (overrides BASE_URL).
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,
    #[arg(long = "admin-user", global = true)]
    pub admin_user: Option<String>,
    #[arg(long = "admin-pwd", global = true)]
    pub admin_pwd: Option<String>,
    #[arg(short = 'n', long = "dry-run", global = true)]
    pub dry_run: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a two-level folder tree over WebDAV and record it in a CSV.
    Folders(FolderArgs),
    /// Create user accounts and record their usernames in a CSV.
    Users(UserArgs),
    /// Delete a single user account by name.
    DeleteUser {
        name: String,
    },
    /// Configuration display and template generation.
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommand>,
    },
}

#[derive(Args, Debug)]
pub struct FolderArgs {
    /// Number of top-level folders, and of subfolders in each.
    #[arg(long = "count")]
    pub count: Option<usize>,
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Abort on the first response that is not 2xx.
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct UserArgs {
    #[arg(long = "count")]
    pub count: Option<usize>,
    /// Username prefix; an index is appended per user.
    #[arg(long = "prefix")]
    pub prefix: Option<String>,
    #[arg(long = "last-name")]
    pub last_name: Option<String>,
    /// Site short name whose group the users join.
    #[arg(long = "site", conflicts_with = "no_site")]
    pub site: Option<String>,
    /// Create users without any group membership.
    #[arg(long = "no-site")]
    pub no_site: bool,
    #[arg(long = "group")]
    pub group: Option<String>,
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Abort on the first response that is not 2xx.
    #[arg(long = "strict")]
    pub strict: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,
    Path,
    Generate {
        #[arg()]
        path: Option<PathBuf>,
        #[arg(long = "force", default_value_t = false)]
        force: bool,
    },
    /// Set a key such as `base_url` or `users.count`.
    Set {
        key: String,
        value: String,
    },
}

/// Helper entry point so `main` can stay minimal.
pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_folder_run_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "seed",
            "folders",
            "--count",
            "3",
            "--base-url",
            "http://localhost:8080",
            "-n",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:8080"));
        let Command::Folders(args) = cli.command else {
            panic!("expected folders command");
        };
        assert_eq!(args.count, Some(3));
        assert!(!args.strict);
    }

    #[test]
    fn site_and_no_site_conflict() {
        let result = Cli::try_parse_from(["seed", "users", "--site", "a", "--no-site"]);
        assert!(result.is_err());
    }

    #[test]
    fn delete_user_takes_a_name() {
        let cli = Cli::try_parse_from(["seed", "delete-user", "User3"]).unwrap();
        assert!(matches!(cli.command, Command::DeleteUser { ref name } if name == "User3"));
    }
}
