//! `claimgraph` — command-line interface to the claim graph.
//!
//! Subcommands create and look up identities and claims, attest claims,
//! run filter queries, manage application membership and profiles, and run
//! the two-user `demo` walkthrough.
//!
//! Results are printed to stdout as JSON (or as text with `--text`); logs go
//! to stderr and are controlled with `RUST_LOG`. Without `--db` (or
//! `CLAIMGRAPH_DB`) the graph lives in memory and is gone on exit.
//!
//! Exit status: 0 on success, 1 when an operation fails, 2 on bad input.

mod demo;

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use claimgraph::render::{render_claim, render_identity, render_profile, render_tally};
use claimgraph::{Claim, ClaimFilter, GetOrCreate, Identity, IdentityFilter, ProfileField};
use claimgraph_store::{open_storage, Application, GraphClient, GraphError, StoreConfig};
use serde::Serialize;

/// claimgraph — identities, attested claims, and profiles built from them
#[derive(Parser)]
#[command(name = "claimgraph", version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database. Omit for an in-memory graph.
    #[arg(long, global = true, env = "CLAIMGRAPH_DB", value_name = "PATH")]
    db: Option<String>,

    /// Caller identifier recorded on attestations.
    #[arg(long, global = true, env = "CLAIMGRAPH_CALLER", value_name = "ID")]
    caller: Option<String>,

    /// Print human-readable text instead of JSON.
    #[arg(long, global = true)]
    text: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and look up identities.
    #[command(subcommand)]
    Identity(IdentityCommand),

    /// Create, attest and look up claims.
    #[command(subcommand)]
    Claim(ClaimCommand),

    /// Run a filter read from a JSON file (or `-` for stdin).
    ///
    /// Example filter selecting the members of "Club":
    ///   {"in_claim":{"as_subject":{
    ///     "where_predicate":{"field":{"field":"display_name","op":"eq","value":"Guest"}},
    ///     "where_object":{"field":{"field":"display_name","op":"eq","value":"Club"}}}}}
    #[command(subcommand)]
    Query(QueryCommand),

    /// Application membership.
    #[command(subcommand)]
    Member(MemberCommand),

    /// Application profiles.
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Walk through the two-user "Internet Amigos" scenario.
    ///
    /// Safe to re-run against a persistent database: everything is
    /// got-or-created.
    Demo,
}

#[derive(Subcommand)]
enum IdentityCommand {
    /// Create an identity, or report the existing one with that name.
    Create {
        name: String,
        #[arg(short = 'd', long, default_value = "")]
        description: String,
    },
    /// Look an identity up by id.
    Get { id: String },
    /// Look an identity up by display name.
    Find { name: String },
}

#[derive(Subcommand)]
enum ClaimCommand {
    /// Create a claim between identities named by display name.
    Create {
        subject: String,
        predicate: String,
        object: String,
        /// Assert the negation instead.
        #[arg(long)]
        deny: bool,
    },
    /// Attest a claim as the current caller.
    Attest {
        claim_id: String,
        #[arg(long)]
        deny: bool,
    },
    /// Show a claim and its attestations.
    Get { claim_id: String },
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Identities matching an identity filter.
    Identities { file: PathBuf },
    /// Claims matching a claim filter.
    Claims { file: PathBuf },
}

#[derive(Subcommand)]
enum MemberCommand {
    /// Join the application as the named identity (created if needed).
    Join { name: String },
    /// List the application's members.
    List,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Write profile fields for a user.
    ///
    /// Example:
    ///   claimgraph profile set "My User" "PROFILE1: My User" \
    ///     "Favorite Ice Cream=Superman" "Shoe Width=Fred Flinstone"
    Set {
        user: String,
        /// Display name of the pointer identity, used if the user has none yet.
        pointer: String,
        #[arg(value_name = "FIELD=VALUE", required = true)]
        fields: Vec<ProfileField>,
    },
    /// Reconstruct a user's profile.
    Show { user: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claimgraph=info,claimgraph_store=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::from_env();
    if let Some(db) = cli.db.clone() {
        config.db_path = Some(db);
    }
    if let Some(caller) = cli.caller.clone() {
        config.caller = caller;
    }

    let storage = open_storage(&config).unwrap_or_else(|e| fatal(&e.to_string()));
    let client = GraphClient::from_config(storage, &config);
    let out = Output { text: cli.text };

    if let Err(e) = run(cli.command, &client, &config, &out).await {
        eprintln!("claimgraph: {e}");
        process::exit(1);
    }
}

async fn run(
    command: Command,
    client: &GraphClient,
    config: &StoreConfig,
    out: &Output,
) -> Result<(), GraphError> {
    match command {
        Command::Identity(cmd) => match cmd {
            IdentityCommand::Create { name, description } => {
                let outcome = client.get_or_create_identity(&name, &description).await?;
                if out.text {
                    let verb = describe_outcome(&outcome);
                    print!("{verb}: {}", render_identity(outcome.get()));
                } else {
                    out.json(&outcome);
                }
            }
            IdentityCommand::Get { id } => out.identity(&client.get_identity(&id).await?),
            IdentityCommand::Find { name } => out.identity(&client.identity_by_name(&name).await?),
        },

        Command::Claim(cmd) => match cmd {
            ClaimCommand::Create { subject, predicate, object, deny } => {
                let s = client.identity_by_name(&subject).await?;
                let p = client.identity_by_name(&predicate).await?;
                let o = client.identity_by_name(&object).await?;
                let outcome = client
                    .get_or_create_claim(&s.identity_id, &p.identity_id, &o.identity_id, !deny)
                    .await?;
                if out.text {
                    let verb = describe_outcome(&outcome);
                    let names = name_map([&s, &p, &o]);
                    let text = render_claim(outcome.get(), |id| names.get(id).map(String::as_str));
                    print!("{verb}: {text}");
                } else {
                    out.json(&outcome);
                }
            }
            ClaimCommand::Attest { claim_id, deny } => {
                let attestation = client.attest_claim(&claim_id, !deny).await?;
                if out.text {
                    print!("{}", render_tally(&client.tally(&claim_id).await?));
                } else {
                    out.json(&attestation);
                }
            }
            ClaimCommand::Get { claim_id } => {
                let claim = client.get_claim(&claim_id).await?;
                let attestations = client.attestations(&claim_id).await?;
                if out.text {
                    let names = claim_names(client, &claim).await?;
                    print!("{}", render_claim(&claim, |id| names.get(id).map(String::as_str)));
                    let tally = claimgraph::AttestationTally::from_attestations(&attestations);
                    print!("{}", render_tally(&tally));
                } else {
                    out.json(&serde_json::json!({ "claim": claim, "attestations": attestations }));
                }
            }
        },

        Command::Query(cmd) => match cmd {
            QueryCommand::Identities { file } => {
                let filter: IdentityFilter = parse_input(&read_input(&file));
                let found = client.query_identities(&filter).await?;
                if out.text {
                    found.iter().for_each(|i| print!("{}", render_identity(i)));
                } else {
                    out.json(&found);
                }
            }
            QueryCommand::Claims { file } => {
                let filter: ClaimFilter = parse_input(&read_input(&file));
                let found = client.query_claims(&filter).await?;
                if out.text {
                    for claim in &found {
                        let names = claim_names(client, claim).await?;
                        print!("{}", render_claim(claim, |id| names.get(id).map(String::as_str)));
                    }
                } else {
                    out.json(&found);
                }
            }
        },

        Command::Member(cmd) => {
            let app = Application::bootstrap(client.clone(), config.conventions.clone()).await?;
            match cmd {
                MemberCommand::Join { name } => {
                    let user = client.get_or_create_identity(&name, "").await?.into_inner();
                    let outcome = app.join(&user.identity_id).await?;
                    if out.text {
                        let verb = if outcome.was_created() {
                            "joined"
                        } else {
                            "already a member"
                        };
                        println!("{name}: {verb} {:?}", config.conventions.app_name);
                    } else {
                        out.json(&outcome);
                    }
                }
                MemberCommand::List => {
                    let members = app.members().await?;
                    if out.text {
                        members.iter().for_each(|i| print!("{}", render_identity(i)));
                    } else {
                        out.json(&members);
                    }
                }
            }
        }

        Command::Profile(cmd) => {
            let app = Application::bootstrap(client.clone(), config.conventions.clone()).await?;
            match cmd {
                ProfileCommand::Set { user, pointer, fields } => {
                    let user = client.identity_by_name(&user).await?;
                    let description = format!("profile for {:?}", user.display_name);
                    let pointer = app
                        .write_profile(&user.identity_id, &pointer, &description, &fields)
                        .await?;
                    let profile = app.profile(&user.identity_id).await?;
                    if out.text {
                        print!("{}", render_profile(&user.display_name, &profile));
                    } else {
                        out.json(&serde_json::json!({ "pointer": pointer, "profile": profile }));
                    }
                }
                ProfileCommand::Show { user } => {
                    let user = client.identity_by_name(&user).await?;
                    let profile = app.profile(&user.identity_id).await?;
                    if out.text {
                        print!("{}", render_profile(&user.display_name, &profile));
                    } else {
                        out.json(&profile);
                    }
                }
            }
        }

        Command::Demo => demo::run(client, config, out).await?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

struct Output {
    text: bool,
}

impl Output {
    fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => fatal(&format!("failed to serialise output: {e}")),
        }
    }

    fn identity(&self, identity: &Identity) {
        if self.text {
            print!("{}", render_identity(identity));
        } else {
            self.json(identity);
        }
    }
}

fn name_map<'a>(identities: impl IntoIterator<Item = &'a Identity>) -> HashMap<String, String> {
    identities
        .into_iter()
        .map(|i| (i.identity_id.clone(), i.display_name.clone()))
        .collect()
}

/// Display names of a claim's three endpoints, keyed by id.
async fn claim_names(
    client: &GraphClient,
    claim: &Claim,
) -> Result<HashMap<String, String>, GraphError> {
    let mut endpoints = Vec::with_capacity(3);
    for (_, id) in claim.endpoints() {
        endpoints.push(client.get_identity(id).await?);
    }
    Ok(name_map(&endpoints))
}

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &PathBuf) -> String {
    if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {}", e)));
        buf
    } else {
        fs::read_to_string(path).unwrap_or_else(|e| {
            fatal(&format!("failed to read {}: {}", path.display(), e))
        })
    }
}

fn parse_input<T: serde::de::DeserializeOwned>(json: &str) -> T {
    serde_json::from_str(json).unwrap_or_else(|e| fatal(&format!("failed to parse filter: {}", e)))
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("claimgraph: {}", msg);
    process::exit(2);
}

fn describe_outcome<T>(outcome: &GetOrCreate<T>) -> &'static str {
    if outcome.was_created() {
        "created"
    } else {
        "existed"
    }
}
