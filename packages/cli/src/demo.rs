//! The "Internet Amigos" walkthrough.
//!
//! Two callers share one graph. Each creates a user, joins the application
//! through the membership predicate and attests it, then writes a profile
//! with fields of their own choosing. The second profile reuses a value
//! identity the first one created. Finally both profiles are reconstructed
//! from claims alone.

use std::collections::BTreeMap;

use claimgraph::render::{render_identity, render_profile};
use claimgraph::{Profile, ProfileField};
use claimgraph_store::{Application, GraphClient, GraphError, StoreConfig};

use crate::Output;

const USER_DESCRIPTION: &str = "I <3 the claim graph";

struct Member {
    name: &'static str,
    pointer: &'static str,
    fields: Vec<ProfileField>,
}

fn members() -> [Member; 2] {
    [
        Member {
            name: "My User",
            pointer: "PROFILE1: My User",
            fields: vec![
                ProfileField::new("Favorite Ice Cream", "Superman").describe(
                    "What is your top flavor?",
                    "Man of steel (or blue moon, lemon and black cherry ice cream)",
                ),
                ProfileField::new("Shoe Width", "Fred Flinstone")
                    .describe("How wide are those tootsies?", "Yabba Dabba Doo!"),
            ],
        },
        Member {
            name: "My Other User",
            pointer: "PROFILE2: My Other User",
            fields: vec![
                // "Superman" already exists; the profile links to it instead
                // of minting a second identity.
                ProfileField::new("Worst Superhero", "Superman")
                    .describe("We all know who it is", ""),
                ProfileField::new("Sense of Smell Ranking (global)", "TOP!")
                    .describe("Noses aren't just for picking!", "Here we are..."),
            ],
        },
    ]
}

pub async fn run(
    client: &GraphClient,
    config: &StoreConfig,
    out: &Output,
) -> Result<(), GraphError> {
    tracing::info!("let's build {:?} on the claim graph", config.conventions.app_name);

    let first = Application::bootstrap(client.clone(), config.conventions.clone()).await?;
    let second = first.for_caller(client.as_caller(format!("{}#2", client.caller())));
    let apps = [&first, &second];

    let mut users = Vec::new();
    for (app, member) in apps.iter().zip(members()) {
        let user = app
            .client()
            .get_or_create_identity(member.name, USER_DESCRIPTION)
            .await?
            .into_inner();
        let joined = app.join(&user.identity_id).await?;
        tracing::info!(
            caller = %app.client().caller(),
            new = joined.was_created(),
            "{:?} is an {:?}",
            member.name,
            config.conventions.member_predicate
        );
        app.write_profile(
            &user.identity_id,
            member.pointer,
            &format!("first profile for {:?}", member.name),
            &member.fields,
        )
        .await?;
        users.push(user);
    }

    let all_members = first.members().await?;
    tracing::info!(count = all_members.len(), "retrieved all members");

    let mut profiles: BTreeMap<String, Profile> = BTreeMap::new();
    for (app, user) in apps.iter().zip(&users) {
        profiles.insert(user.display_name.clone(), app.profile(&user.identity_id).await?);
    }

    if out.text {
        println!("Members of {}", config.conventions.app_name);
        all_members.iter().for_each(|m| print!("{}", render_identity(m)));
        for (owner, profile) in &profiles {
            println!();
            print!("{}", render_profile(owner, profile));
        }
    } else {
        out.json(&serde_json::json!({
            "members": all_members,
            "profiles": profiles,
        }));
    }
    Ok(())
}
