use anyhow::{anyhow, Context};
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::open_store;
use crate::filter::{Field, Predicate};

pub async fn issue(email: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&config().database).await.context("opening store")?;
    let user = store
        .users()
        .find_one(&Predicate::eq(Field::Email, email.trim()))
        .await?
        .ok_or_else(|| anyhow!("no account with email {}", email))?;
    let token = generate_jwt(&Claims::for_user(&user))?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "token": token, "role": user.role })),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
