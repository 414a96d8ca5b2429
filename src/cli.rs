use crate::model::{ClientConfig, MatchCriteria, Profile, Stage};
use crate::service::HttpMatchService;
use crate::store::FileStore;
use crate::workflow::{matches, profile, shares, Workflow, WorkflowCommand};
use anyhow::{bail, Result};
use clap::Parser;
use rand::{Rng, RngCore};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "co-match-cli",
    version,
    about = "Co-Match private matching client with optional TUI"
)]
pub struct Cli {
    /// Base URL of the computation service (upload and matches)
    #[arg(long, default_value = "http://localhost:8000")]
    pub api_url: String,

    /// URL of the share-splitting endpoint
    #[arg(long, default_value = "http://localhost:3000/api/split")]
    pub split_url: String,

    /// Print the match list as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print the match list as text and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Public handle attached to the upload, shown to your matches
    #[arg(long)]
    pub handle: Option<String>,

    /// Profile age
    #[arg(long, default_value_t = 30)]
    pub age: u32,

    /// Profile gender (0 or 1)
    #[arg(long, default_value_t = 0)]
    pub gender: u32,

    /// Profile region (1-4)
    #[arg(long, default_value_t = 1)]
    pub region: u32,

    /// Interest selection; exactly three distinct values are required to submit
    #[arg(long = "interest")]
    pub interests: Vec<u32>,

    /// Minimum preferred age
    #[arg(long, default_value_t = 25)]
    pub age_min: u32,

    /// Maximum preferred age
    #[arg(long, default_value_t = 35)]
    pub age_max: u32,

    /// Preferred gender (0, 1, or 2 for any)
    #[arg(long, default_value_t = profile::PREF_GENDER_ANY)]
    pub pref_gender: u32,

    /// Override the persisted-state file location
    #[arg(long)]
    pub store: Option<std::path::PathBuf>,

    /// Wipe all persisted state and start over from the profile stage
    #[arg(long)]
    pub reset: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args, false).await;
        }
    }

    let as_json = args.json;
    run_headless(args, as_json).await
}

/// Build the injected client configuration from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        api_url: args.api_url.clone(),
        split_url: args.split_url.clone(),
        user_agent: format!("co-match-cli/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Locally generated opaque profile identifier.
fn gen_profile_id() -> String {
    let mut b = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut b);
    format!("0x{}", hex::encode(b))
}

/// Seed record for the profile stage: CLI field values over randomized
/// identifiers.
pub fn build_draft_profile(args: &Cli) -> Profile {
    Profile {
        id: gen_profile_id(),
        id_nullifier: rand::thread_rng().gen(),
        age: args.age.clamp(profile::AGE_MIN, profile::AGE_MAX),
        gender: args.gender.min(1),
        region: args.region.clamp(1, profile::REGION_MAX),
        interests: args.interests.clone(),
        preferences: MatchCriteria {
            age_min: args.age_min,
            age_max: args.age_max,
            gender: args.pref_gender.min(profile::PREF_GENDER_ANY),
        },
    }
}

pub fn open_store(args: &Cli) -> Result<FileStore> {
    let path = match &args.store {
        Some(path) => path.clone(),
        None => FileStore::default_path()?,
    };
    FileStore::open(path)
}

/// Drive the workflow end-to-end without a TUI and print the match list.
/// Resumes from whatever stage the persisted state derives to.
async fn run_headless(args: Cli, as_json: bool) -> Result<()> {
    let cfg = build_config(&args);
    let store = open_store(&args)?;
    let mut wf = Workflow::load(store, build_draft_profile(&args))?;
    if args.reset {
        wf.reset(build_draft_profile(&args))?;
        eprintln!("Persisted state cleared.");
    }
    let service = HttpMatchService::new(&cfg)?;

    if wf.stage() == Stage::Profile {
        if !wf.profile.can_submit() {
            bail!(
                "exactly {} distinct interests are required to submit ({} more needed, use --interest)",
                profile::REQUIRED_INTERESTS,
                wf.profile.interests_remaining()
            );
        }
        wf.submit_profile()?;
        eprintln!("Profile submitted.");
    }

    if wf.stage() == Stage::Shares {
        match args.handle.as_deref().map(str::trim) {
            Some(handle) if !handle.is_empty() => wf.shares.handle = handle.to_string(),
            _ => bail!("a public handle is required to upload shares (--handle)"),
        }

        eprintln!("Generating shares…");
        let Some(WorkflowCommand::GenerateShares { profile }) = wf.begin_generate() else {
            bail!("share generation is unavailable in this state");
        };
        wf.apply(shares::generate(&service, &profile).await)?;
        if let Some(message) = wf.shares.error.take() {
            bail!("{message}");
        }

        let count = wf.shares.shares.as_ref().map(|s| s.len()).unwrap_or(0);
        eprintln!("Generated {count} shares. Uploading…");
        let Some(WorkflowCommand::UploadShares { shares: set, handle }) = wf.begin_upload() else {
            bail!("share upload is unavailable in this state");
        };
        wf.apply(shares::upload(&service, &set, &handle).await)?;
        if let Some(message) = wf.shares.error.take() {
            bail!("{message}");
        }
        eprintln!("Upload accepted.");
    }

    if wf.token().is_none() {
        bail!("no session token is available; upload shares first");
    }
    eprintln!("Checking for matches…");
    let Some(WorkflowCommand::FetchMatches { token }) = wf.begin_match_fetch() else {
        bail!("match retrieval is unavailable in this state");
    };
    wf.apply(matches::retrieve(&service, &token).await)?;
    if let Some(message) = wf.matches.error.clone() {
        bail!("{message}");
    }

    let handles = wf.matches.matches.clone().unwrap_or_default();
    if as_json {
        let out = serde_json::to_string_pretty(&serde_json::json!({ "matches": handles }))?;
        println!("{out}");
    } else if handles.is_empty() {
        println!("No matches yet.");
    } else {
        for handle in &handles {
            println!("@{handle}");
        }
    }

    Ok(())
}
