//! CRUD handlers shared by every backend collection.

use std::fs;
use std::io::Read;

use anyhow::{Context as _, Result};
use courier_core::api::Resource;
use serde::Serialize;

use super::Context;
use crate::cli::ResourceCommands;

pub async fn run<R: Resource>(ctx: &Context, command: ResourceCommands) -> Result<()> {
    let client = &ctx.client;
    match command {
        ResourceCommands::List => print_json(&client.list::<R>().await?),
        ResourceCommands::Get { id } => print_json(&client.get::<R>(id).await?),
        ResourceCommands::Create { json } => {
            let record: R = read_record(&json)?;
            print_json(&client.create(&record).await?)
        }
        ResourceCommands::Update { id, json } => {
            let record: R = read_record(&json)?;
            print_json(&client.update(id, &record).await?)
        }
        ResourceCommands::Delete { id } => {
            client.delete::<R>(id).await?;
            println!("Deleted {} {id}", R::NAME);
            Ok(())
        }
    }
}

/// Reads a record from `source`, a file path or `-` for stdin.
fn read_record<R: Resource>(source: &str) -> Result<R> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read record from stdin")?;
        buf
    } else {
        fs::read_to_string(source).with_context(|| format!("read {source}"))?
    };

    serde_json::from_str(&raw).with_context(|| format!("parse {} JSON", R::NAME))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
