use std::io::Write;

use bytes::Bytes;
use clap::{Args, Subcommand};
use serde_json::json;
use tokio::io::AsyncReadExt;

use goblin_facade::GobStore;

use super::Context;
use crate::OutputFormat;

#[derive(Subcommand, Debug)]
pub enum GobCommand {
    /// Upload a gob. Data is taken from the arguments, or stdin if none.
    Put(PutArgs),
    /// Print a gob's payload.
    Get { id: String },
    /// Append to a gob. Data is taken from the arguments, or stdin if none.
    Append(AppendArgs),
    /// Delete a gob by id.
    Del { id: String },
    /// Delete the gob a token grants rights over.
    DelToken { token: String },
    /// List a horde, most recent first.
    Horde { name: String },
    /// Resolve a token to its gob id.
    Token { token: String },
    /// Bring back a deleted gob inside its grace window.
    Restore { id: String },
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Add the gob to this horde.
    #[arg(long)]
    pub horde: Option<String>,
    pub text: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AppendArgs {
    pub id: String,
    pub text: Vec<String>,
}

async fn payload(text: Vec<String>, ctx: &Context) -> anyhow::Result<Bytes> {
    if !text.is_empty() {
        return Ok(Bytes::from(text.join(" ")));
    }
    if !ctx.read_stdin {
        anyhow::bail!("no data given");
    }
    let mut buf = Vec::new();
    tokio::io::stdin().read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

pub async fn run<W: Write>(
    gobs: &GobStore,
    command: GobCommand,
    ctx: &Context,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        GobCommand::Put(args) => {
            let data = payload(args.text, ctx).await?;
            let (id, token) = match &args.horde {
                Some(horde) => gobs.put_horde_gob(horde, data, &ctx.ip).await?,
                None => gobs.put_gob(data, &ctx.ip).await?,
            };
            match ctx.format {
                OutputFormat::Json => {
                    writeln!(out, "{}", json!({ "id": id, "token": token, "horde": args.horde }))?;
                }
                OutputFormat::Text => {
                    writeln!(out, "id:    {id}")?;
                    writeln!(out, "token: {token}")?;
                }
            }
        }
        GobCommand::Get { id } => {
            let Some((data, content_type)) = gobs.get_gob(&id).await? else {
                anyhow::bail!("gob {id} not found");
            };
            match ctx.format {
                OutputFormat::Json => {
                    let body = json!({
                        "id": id,
                        "content_type": content_type,
                        "size": data.len(),
                        "data": String::from_utf8_lossy(&data),
                    });
                    writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
                }
                OutputFormat::Text => out.write_all(&data)?,
            }
        }
        GobCommand::Append(args) => {
            let data = payload(args.text, ctx).await?;
            let Some(len) = gobs.append_gob(&args.id, &data).await? else {
                anyhow::bail!("gob {} not found", args.id);
            };
            match ctx.format {
                OutputFormat::Json => writeln!(out, "{}", json!({ "id": args.id, "size": len }))?,
                OutputFormat::Text => writeln!(out, "size: {len}")?,
            }
        }
        GobCommand::Del { id } => {
            if !gobs.del_gob(&id).await? {
                anyhow::bail!("gob {id} not found");
            }
            report_deleted(out, &ctx.format, &id)?;
        }
        GobCommand::DelToken { token } => {
            let Some(id) = gobs.del_gob_by_token(&token).await? else {
                anyhow::bail!("unknown token");
            };
            report_deleted(out, &ctx.format, &id)?;
        }
        GobCommand::Horde { name } => {
            let entries = gobs.get_horde(&name).await?;
            match ctx.format {
                OutputFormat::Json => {
                    writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
                }
                OutputFormat::Text => {
                    if entries.is_empty() {
                        writeln!(out, "Horde {name} is empty.")?;
                    }
                    for entry in &entries {
                        writeln!(
                            out,
                            "  {id}  {created}",
                            id = entry.id,
                            created = entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        )?;
                    }
                }
            }
        }
        GobCommand::Token { token } => {
            let Some(id) = gobs.token_to_id(&token).await? else {
                anyhow::bail!("unknown token");
            };
            match ctx.format {
                OutputFormat::Json => writeln!(out, "{}", json!({ "id": id }))?,
                OutputFormat::Text => writeln!(out, "{id}")?,
            }
        }
        GobCommand::Restore { id } => {
            if !gobs.restore_gob(&id).await? {
                anyhow::bail!("nothing to restore for {id}");
            }
            match ctx.format {
                OutputFormat::Json => writeln!(out, "{}", json!({ "restored": id }))?,
                OutputFormat::Text => writeln!(out, "restored {id}")?,
            }
        }
    }
    Ok(())
}

fn report_deleted<W: Write>(out: &mut W, format: &OutputFormat, id: &str) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "deleted": id }))?,
        OutputFormat::Text => writeln!(out, "deleted {id}")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use goblin_facade::GobSettings;
    use goblin_store_memory::MemoryDataStore;

    use super::*;

    fn gob_store() -> GobStore {
        GobStore::new(Arc::new(MemoryDataStore::new()), GobSettings::default())
    }

    fn ctx(format: OutputFormat) -> Context {
        Context {
            format,
            ip: "192.0.2.7".into(),
            read_stdin: false,
        }
    }

    async fn put_json(gobs: &GobStore, text: &str, horde: Option<&str>) -> serde_json::Value {
        let mut out = Vec::new();
        let command = GobCommand::Put(PutArgs {
            horde: horde.map(str::to_owned),
            text: vec![text.to_owned()],
        });
        run(gobs, command, &ctx(OutputFormat::Json), &mut out)
            .await
            .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[tokio::test]
    async fn put_prints_id_and_token() {
        let gobs = gob_store();
        let put = put_json(&gobs, "hello", Some("notes")).await;
        assert_eq!(put["id"].as_str().unwrap().len(), 6);
        assert_eq!(put["token"].as_str().unwrap().len(), 16);
        assert_eq!(put["horde"], "notes");
    }

    #[tokio::test]
    async fn get_writes_raw_payload_in_text_mode() {
        let gobs = gob_store();
        let put = put_json(&gobs, "raw bytes", None).await;
        let id = put["id"].as_str().unwrap().to_owned();

        let mut out = Vec::new();
        run(&gobs, GobCommand::Get { id }, &ctx(OutputFormat::Text), &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"raw bytes");
    }

    #[tokio::test]
    async fn missing_gob_is_an_error() {
        let gobs = gob_store();
        let mut out = Vec::new();
        let err = run(
            &gobs,
            GobCommand::Get { id: "nope".into() },
            &ctx(OutputFormat::Text),
            &mut out,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn put_without_text_or_stdin_fails() {
        let gobs = gob_store();
        let mut out = Vec::new();
        let command = GobCommand::Put(PutArgs {
            horde: None,
            text: Vec::new(),
        });
        assert!(
            run(&gobs, command, &ctx(OutputFormat::Text), &mut out)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn horde_lists_json_entries() {
        let gobs = gob_store();
        let first = put_json(&gobs, "a", Some("h")).await;
        let second = put_json(&gobs, "b", Some("h")).await;

        let mut out = Vec::new();
        run(
            &gobs,
            GobCommand::Horde { name: "h".into() },
            &ctx(OutputFormat::Json),
            &mut out,
        )
        .await
        .unwrap();
        let listed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(listed[0]["id"], second["id"]);
        assert_eq!(listed[1]["id"], first["id"]);
    }
}
