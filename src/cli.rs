use std::{collections::HashMap, fs, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::{signal, sync::broadcast::error::RecvError};

use crate::{
    db::{Database, GroupFilter},
    playback::{
        voice_from_name, PlaybackController, PlaybackEvent, SpeechEngineHandle, StopReason,
    },
    settings::{PatternItem, SettingsStore},
    stats::{render_table, word_stats, StatsQuery},
    words::parse_word_list,
};

/// Timed vocabulary drills read aloud in a configurable pattern.
#[derive(Parser, Debug)]
#[command(name = "vocabloop")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a word list and play it until time runs out or Ctrl-C.
    Play(PlayArgs),
    /// Print the entries a word list parses into.
    Parse {
        /// Text file with one `term - translation` entry per line
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Text file with one `term - translation` entry per line
    #[arg(short, long)]
    pub words: PathBuf,

    /// Put the loaded words in a named group and play only that group
    #[arg(short, long)]
    pub group: Option<String>,

    /// JSON settings file (durationMinutes, playbackRate, pattern)
    #[arg(short, long, env = "VOCABLOOP_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Session length in minutes (1, 5, 10, 15, 30 or 60)
    #[arg(short, long)]
    pub minutes: Option<u32>,

    /// Speech rate multiplier, clamped to 0.5..=1.2
    #[arg(short, long)]
    pub rate: Option<f32>,

    /// Comma-separated steps, e.g. `term,translation,spell,term`
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Speech backend: `console` or `command`
    #[arg(long, default_value = "console")]
    pub voice: String,

    /// Program the `command` backend runs
    #[arg(long, default_value = "espeak-ng", env = "VOCABLOOP_SPEECH_CMD")]
    pub speech_cmd: String,
}

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Play(args) => play(args).await,
        Command::Parse { file } => parse(file),
    }
}

fn parse(file: PathBuf) -> Result<()> {
    let text = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read word list {}", file.display()))?;
    let entries = parse_word_list(&text);
    for entry in &entries {
        println!("{}\t{}", entry.term, entry.translation);
    }
    log::info!("parsed {} entries from {}", entries.len(), file.display());
    Ok(())
}

fn parse_pattern(raw: &str) -> Result<Vec<PatternItem>> {
    raw.split(',')
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(|step| PatternItem::parse(step).ok_or_else(|| anyhow!("unknown pattern step '{step}'")))
        .collect()
}

fn load_settings(args: &PlayArgs) -> Result<SettingsStore> {
    let settings = SettingsStore::load(args.settings.as_deref())?;
    if let Some(minutes) = args.minutes {
        settings.set_duration_minutes(minutes)?;
    }
    if let Some(rate) = args.rate {
        let applied = settings.set_playback_rate(rate);
        if applied != rate {
            log::warn!("rate {rate} clamped to {applied}");
        }
    }
    if let Some(pattern) = &args.pattern {
        settings.set_pattern(parse_pattern(pattern)?);
    }
    Ok(settings)
}

/// Whole minutes left, on the ticks that land on a minute boundary. The final
/// tick is reported as expiry instead.
fn minute_mark(remaining_secs: u64) -> Option<u64> {
    (remaining_secs > 0 && remaining_secs % 60 == 0).then_some(remaining_secs / 60)
}

async fn play(args: PlayArgs) -> Result<()> {
    let text = fs::read_to_string(&args.words)
        .with_context(|| format!("Failed to read word list {}", args.words.display()))?;
    let entries = parse_word_list(&text);
    if entries.is_empty() {
        bail!("no entries found in {}", args.words.display());
    }

    let settings = Arc::new(load_settings(&args)?);
    let db = Database::open()?;

    let group_id = match &args.group {
        Some(name) => match db.find_group_by_name(name).await? {
            Some(group) => Some(group.id),
            None => Some(db.create_group(name.clone()).await?.id),
        },
        None => None,
    };
    let inserted = db.insert_words(entries, group_id.clone()).await?;
    let terms: HashMap<String, String> = inserted
        .iter()
        .map(|w| (w.id.clone(), w.term.clone()))
        .collect();
    log::info!("loaded {} words", inserted.len());

    let voice = voice_from_name(&args.voice, &args.speech_cmd)?;
    let engine = SpeechEngineHandle::spawn(voice)?;
    let controller = PlaybackController::new(Arc::new(db.clone()), Arc::new(engine), settings);
    let mut events = controller.subscribe();

    let snapshot = controller
        .start_selected(GroupFilter::from(group_id))
        .await?;
    println!(
        "Playing {} words for {}s. Ctrl-C to stop.",
        snapshot.rotation_len,
        snapshot.remaining_secs.unwrap_or_default()
    );

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                controller.stop();
            }
            event = events.recv() => match event {
                Ok(PlaybackEvent::WordStarted { word_id, index }) => {
                    let term = terms.get(&word_id).map(String::as_str).unwrap_or("?");
                    println!("[{index}] {term}");
                }
                Ok(PlaybackEvent::Tick { remaining_secs }) => {
                    if let Some(minutes) = minute_mark(remaining_secs) {
                        println!("{minutes} min left");
                    }
                }
                Ok(PlaybackEvent::BlockingCondition { reason }) => {
                    println!("Playback blocked: {reason:?}");
                }
                Ok(PlaybackEvent::Stopped { reason }) => {
                    if reason == StopReason::Expired {
                        println!("Time is up.");
                    }
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("event listener fell behind by {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    controller.shutdown().await;

    let words = db.list_words(GroupFilter::All).await?;
    let groups = db.list_groups().await?;
    print!(
        "{}",
        render_table(&word_stats(&words, &groups, &StatsQuery::default()))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_flag_accepts_aliases() {
        let pattern = parse_pattern("term, zh ,spelled-out,,en").unwrap();
        assert_eq!(
            pattern,
            vec![
                PatternItem::Term,
                PatternItem::Translation,
                PatternItem::Spell,
                PatternItem::Term
            ]
        );
        assert!(parse_pattern("term,hum").is_err());
    }

    #[test]
    fn minute_marks_skip_the_final_tick() {
        assert_eq!(minute_mark(120), Some(2));
        assert_eq!(minute_mark(60), Some(1));
        assert_eq!(minute_mark(59), None);
        assert_eq!(minute_mark(0), None);
    }

    #[test]
    fn cli_parses_play_overrides() {
        let cli = Cli::try_parse_from([
            "vocabloop", "play", "--words", "list.txt", "--minutes", "10", "--rate", "0.8",
            "--pattern", "term,spell",
        ])
        .unwrap();
        let Command::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.minutes, Some(10));
        assert_eq!(args.voice, "console");
        let settings = load_settings(&args).unwrap();
        let current = settings.current();
        assert_eq!(current.duration_minutes, 10);
        assert_eq!(current.pattern, vec![PatternItem::Term, PatternItem::Spell]);
    }
}
