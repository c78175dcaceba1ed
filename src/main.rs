use color_eyre::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tallybook::{
    Config, Database, Profile, RecordEdit, RecordStore, StatusFilter,
    cli::{self, Cli, Commands},
    logging,
};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    // An explicit --config file wins over the profile's config
    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(Path::new(path))?,
        None => Config::load_with_profile(profile)?,
    };

    logging::init_tracing(&config.log_level);

    let kind = match cli.app {
        Some(kind) => kind,
        None => config.default_app_kind()?,
    };

    let db_path = config.get_database_path(profile);
    let db = Database::new(
        db_path.to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?
    )?;
    let mut store = RecordStore::open(db, kind)?;

    let command = cli.command.unwrap_or(Commands::List {
        filter: StatusFilter::All,
        search: None,
    });

    // Dispatch to appropriate command handler
    match command {
        Commands::Add { text, secondary, reference, classifier } => {
            cli::handle_add(&mut store, text, secondary, reference, classifier)?;
        }
        Commands::List { filter, search } => {
            cli::handle_list(&store, filter, search)?;
        }
        Commands::Toggle { id } => {
            cli::handle_toggle(&mut store, id)?;
        }
        Commands::SetStatus { id, status } => {
            cli::handle_set_status(&mut store, id, status)?;
        }
        Commands::Edit { id, text, secondary, reference, classifier } => {
            let edit = RecordEdit {
                primary_text: text,
                secondary_text: secondary,
                reference,
                classifier,
            };
            cli::handle_edit(&mut store, id, edit)?;
        }
        Commands::Options { id, priority, due, clear_due, tags, clear_tags } => {
            cli::handle_options(&mut store, id, priority, due, clear_due, tags, clear_tags)?;
        }
        Commands::Delete { id, yes } => {
            cli::handle_delete(&mut store, id, yes)?;
        }
        Commands::Clear { yes } => {
            cli::handle_clear(&mut store, yes)?;
        }
        Commands::ClearCompleted { yes } => {
            cli::handle_clear_completed(&mut store, yes)?;
        }
        Commands::Export { out } => {
            let out_dir = out.map(PathBuf::from).unwrap_or_else(|| config.get_export_dir());
            cli::handle_export(&store, &out_dir)?;
        }
        Commands::Import { file } => {
            cli::handle_import(&mut store, &file)?;
        }
        Commands::Stats => {
            cli::handle_stats(&store)?;
        }
        Commands::Seed => {
            cli::handle_seed(&mut store)?;
        }
    }

    Ok(())
}
