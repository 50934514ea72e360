use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{info, warn};
use rand::Rng;
use serde::Deserialize;

use rs_markov_core::io::read_lines;
use rs_markov_core::model::node::WeightedNode;
use rs_markov_core::{DEFAULT_ORDER, FolderStore, MarkovModel, SnapshotStore, Strategy, current_day};

/// Train, untrain and sample named Markov chain models.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Folder holding model snapshots
    #[arg(long, env = "RS_MARKOV_DATA", default_value = "./data")]
    data: PathBuf,

    /// JSON file mapping model names to order, strategy, window and weight
    #[arg(long, env = "RS_MARKOV_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on every new non-blank line of a text file
    Train {
        name: String,
        file: PathBuf,
        /// Context length for a new model (ignored if it exists)
        #[arg(long)]
        order: Option<usize>,
        /// Tokenization for a new model: character or word
        #[arg(long)]
        strategy: Option<Strategy>,
        /// Untrain lines added more than this many days ago
        #[arg(long)]
        window: Option<u64>,
        /// File of lines that must never be trained on
        #[arg(long)]
        blacklist: Option<PathBuf>,
    },
    /// Remove every non-blank line of a text file from a model
    Untrain { name: String, file: PathBuf },
    /// Print generated sequences
    Generate {
        /// Model to sample; picked at random by weight when omitted
        name: Option<String>,
        /// Number of sequences to print
        #[arg(short, long, default_value_t = 1)]
        count: usize,
        /// Maximum tokens per sequence
        #[arg(long, default_value_t = 280)]
        max_tokens: usize,
    },
    /// Show a model's settings and size
    Info { name: String },
    /// List stored models
    List,
    /// Delete a stored model
    Delete { name: String },
}

/// Per-model entry of the settings file.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
struct ModelSettings {
    order: Option<usize>,
    strategy: Option<String>,
    window: Option<u64>,
    weight: Option<usize>,
}

/// Settings file, e.g. `{"models": {"news": {"order": 2, "strategy": "word", "weight": 3}}}`.
#[derive(Deserialize, Debug, Default, PartialEq)]
struct Settings {
    #[serde(default)]
    models: HashMap<String, ModelSettings>,
}

impl Settings {
    fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
            None => Ok(Self::default()),
        }
    }

    fn model(&self, name: &str) -> ModelSettings {
        self.models.get(name).cloned().unwrap_or_default()
    }

    /// Weight of `name` in a random pick. Unlisted models weigh 1.
    fn weight(&self, name: &str) -> usize {
        self.models.get(name).and_then(|model| model.weight).unwrap_or(1)
    }
}

/// Creation options and retention window for one `train` run.
#[derive(Debug, PartialEq)]
struct TrainOptions {
    order: usize,
    strategy: Strategy,
    window: Option<u64>,
}

/// Command-line values win over the settings file, which wins over defaults.
fn resolve_train_options(
    settings: &ModelSettings,
    order: Option<usize>,
    strategy: Option<Strategy>,
    window: Option<u64>,
) -> Result<TrainOptions, Box<dyn std::error::Error>> {
    let strategy = match (strategy, &settings.strategy) {
        (Some(strategy), _) => strategy,
        (None, Some(name)) => name.parse::<Strategy>()?,
        (None, None) => Strategy::default(),
    };
    Ok(TrainOptions {
        order: order.or(settings.order).unwrap_or(DEFAULT_ORDER),
        strategy,
        window: window.or(settings.window),
    })
}

/// Picks one of `names` with probability proportional to its weight.
fn pick_model<R: Rng + ?Sized>(names: &[String], settings: &Settings, rng: &mut R) -> Option<String> {
    let mut weights = WeightedNode::new();
    for name in names {
        for _ in 0..settings.weight(name) {
            weights.increment(name.clone());
        }
    }
    weights.pick_weighted(rng).cloned()
}

/// Drops blacklisted lines. Repeats are handled by the trained-lines record.
fn filter_lines(lines: Vec<String>, blacklist: &HashSet<String>) -> Vec<String> {
    lines.into_iter().filter(|line| !blacklist.contains(line)).collect()
}

fn require_model(store: &FolderStore, name: &str) -> Result<MarkovModel, Box<dyn std::error::Error>> {
    store
        .load_model(name)?
        .ok_or_else(|| format!("Model '{}' not found in {}", name, store.folder().display()).into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = FolderStore::new(&cli.data)?;
    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Command::Train { name, file, order, strategy, window, blacklist } => {
            let options = resolve_train_options(&settings.model(&name), order, strategy, window)?;
            let blacklist: HashSet<String> = match blacklist {
                Some(path) => read_lines(path)?.into_iter().collect(),
                None => HashSet::new(),
            };
            let lines = filter_lines(read_lines(&file)?, &blacklist);

            let mut model = store.load_or_create(&name, options.order, options.strategy)?;
            let mut record = store.load_record(&name)?;
            let outcome = record.update(&mut model, &lines, options.window, current_day());
            store.save_model(&name, &model)?;
            store.save_record(&name, &record)?;
            info!(
                "trained '{}' on {} new lines from {} ({} already known, {} retired)",
                name,
                outcome.trained,
                file.display(),
                outcome.skipped,
                outcome.retired
            );
        }
        Command::Untrain { name, file } => {
            let mut model = require_model(&store, &name)?;
            let mut record = store.load_record(&name)?;
            let mut missing = 0;
            for line in read_lines(&file)? {
                missing += model.untrain(&line).missing;
                record.forget(&line);
            }
            store.save_model(&name, &model)?;
            store.save_record(&name, &record)?;
            if missing > 0 {
                warn!("{} observations were not found in '{}'", missing, name);
            }
            info!("untrained '{}' from {}", name, file.display());
        }
        Command::Generate { name, count, max_tokens } => {
            let name = match name {
                Some(name) => name,
                None => pick_model(&store.names()?, &settings, &mut rand::rng())
                    .ok_or_else(|| format!("No model with a positive weight in {}", store.folder().display()))?,
            };
            let model = require_model(&store, &name)?;
            if !model.is_trained() {
                warn!("model '{}' is not trained yet", name);
            }
            for _ in 0..count {
                println!("{}", model.generate_text(max_tokens));
            }
        }
        Command::Info { name } => {
            let model = require_model(&store, &name)?;
            let record = store.load_record(&name)?;
            println!("name:      {}", name);
            println!("order:     {}", model.order());
            println!("strategy:  {}", model.strategy());
            println!("version:   {}", model.version());
            println!("trained:   {}", model.is_trained());
            println!("windows:   {}", model.graph().count());
            println!("contexts:  {}", model.graph().context_count());
            println!("lines:     {}", record.len());
            println!("weight:    {}", settings.weight(&name));
        }
        Command::List => {
            for name in store.names()? {
                println!("{}", name);
            }
        }
        Command::Delete { name } => {
            if store.remove(&name)? {
                info!("deleted '{}'", name);
            } else {
                warn!("model '{}' does not exist", name);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn settings(json: &str) -> Settings {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_drops_blacklisted_lines() {
        let blacklist: HashSet<String> = ["old story".to_owned()].into_iter().collect();
        let lines = vec!["fresh story".to_owned(), "old story".to_owned(), "another one".to_owned()];

        assert_eq!(filter_lines(lines, &blacklist), vec!["fresh story", "another one"]);
    }

    #[test]
    fn parses_train_options() {
        let cli = Cli::try_parse_from([
            "rs-markov", "--data", "/tmp/models", "train", "news", "headlines.txt", "--order", "3",
            "--strategy", "word", "--window", "7",
        ])
        .unwrap();

        assert_eq!(cli.data, PathBuf::from("/tmp/models"));
        match cli.command {
            Command::Train { name, order, strategy, window, blacklist, .. } => {
                assert_eq!(name, "news");
                assert_eq!(order, Some(3));
                assert_eq!(strategy, Some(Strategy::Word));
                assert_eq!(window, Some(7));
                assert!(blacklist.is_none());
            }
            _ => panic!("expected train command"),
        }
    }

    #[test]
    fn generate_name_is_optional() {
        let cli = Cli::try_parse_from(["rs-markov", "generate", "--count", "2"]).unwrap();
        match cli.command {
            Command::Generate { name, count, .. } => {
                assert!(name.is_none());
                assert_eq!(count, 2);
            }
            _ => panic!("expected generate command"),
        }
    }

    #[test]
    fn arguments_override_settings_file() {
        let settings = settings(r#"{"models": {"news": {"order": 2, "strategy": "word", "window": 30}}}"#);

        let from_file = resolve_train_options(&settings.model("news"), None, None, None).unwrap();
        assert_eq!(from_file, TrainOptions { order: 2, strategy: Strategy::Word, window: Some(30) });

        let overridden =
            resolve_train_options(&settings.model("news"), Some(4), Some(Strategy::Character), Some(1)).unwrap();
        assert_eq!(overridden, TrainOptions { order: 4, strategy: Strategy::Character, window: Some(1) });

        let unlisted = resolve_train_options(&settings.model("tech"), None, None, None).unwrap();
        assert_eq!(unlisted, TrainOptions { order: DEFAULT_ORDER, strategy: Strategy::Character, window: None });
    }

    #[test]
    fn unknown_strategy_in_settings_is_an_error() {
        let settings = settings(r#"{"models": {"news": {"strategy": "syllable"}}}"#);
        assert!(resolve_train_options(&settings.model("news"), None, None, None).is_err());
    }

    #[test]
    fn settings_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"models": {"news": {"weight": 3}}}"#).unwrap();

        let loaded = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded.weight("news"), 3);
        assert_eq!(loaded.weight("tech"), 1);
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn weighted_pick_follows_settings() {
        let settings = settings(r#"{"models": {"news": {"weight": 3}, "muted": {"weight": 0}}}"#);
        let names = vec!["muted".to_owned(), "news".to_owned(), "tech".to_owned()];
        let mut rng = StdRng::seed_from_u64(11);

        let mut picks: HashMap<String, usize> = HashMap::new();
        for _ in 0..4000 {
            *picks.entry(pick_model(&names, &settings, &mut rng).unwrap()).or_default() += 1;
        }

        assert!(!picks.contains_key("muted"));
        let ratio = picks["news"] as f64 / picks["tech"] as f64;
        assert!((2.5..3.5).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn weighted_pick_needs_a_positive_weight() {
        let settings = settings(r#"{"models": {"news": {"weight": 0}}}"#);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(pick_model(&["news".to_owned()], &settings, &mut rng), None);
        assert_eq!(pick_model(&[], &settings, &mut rng), None);
    }
}
