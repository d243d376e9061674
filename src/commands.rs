use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use futures_util::future::try_join_all;

use crate::composer::{self, ComposeFlags};
use crate::config::ACTIVATION_LIST_MAX;
use crate::kinds::KindLookup;
use crate::logs::{self, LogSlice};
use crate::models::{Activation, ActivationLogs, Operation, Package, Trigger};
use crate::runtime_api::{ActionSubmitter, Client};

// ------------------- action create / update -------------------

/// Compose the action from flags and submit it. Any failure is reported under
/// `failed to create the action` / `failed to update the action`.
pub async fn cmd_action_write(
    submitter: &dyn ActionSubmitter,
    kinds: &dyn KindLookup,
    flags: &ComposeFlags,
    op: Operation,
    json: bool,
) -> Result<()> {
    let prefix = || format!("failed to {} the action", op.verb());

    let spec = composer::compose(flags, op, kinds).with_context(prefix)?;
    tracing::info!(name = %spec.name, op = op.verb(), "submitting action");
    let result = submitter.submit(op, &spec).await.with_context(prefix)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let done = match op {
            Operation::Create => "created",
            Operation::Update => "updated",
        };
        println!("✓ {done} action {}", spec.name);
    }
    Ok(())
}

// ------------------- package / trigger listing -------------------

#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub name_sort: bool,
    pub json: bool,
}

pub async fn cmd_package_list(client: &Client, namespace: Option<&str>, args: &ListArgs) -> Result<()> {
    let mut packages = client
        .list_packages(namespace, args.limit, args.skip)
        .await
        .context("failed to list the packages")?;
    if args.name_sort {
        packages.sort_by_key(|p| p.name.to_lowercase());
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
    } else {
        print!("{}", package_table(&packages));
    }
    Ok(())
}

pub async fn cmd_trigger_list(client: &Client, args: &ListArgs) -> Result<()> {
    let mut triggers = client
        .list_triggers(args.limit, args.skip)
        .await
        .context("failed to list triggers")?;
    if args.name_sort {
        triggers.sort_by_key(|t| t.name.to_lowercase());
    }
    // the collection listing carries no rule status
    let detailed = try_join_all(triggers.iter().map(|t| client.get_trigger(&t.name)))
        .await
        .context("failed to list triggers")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&detailed)?);
    } else if !detailed.is_empty() {
        print!("{}", trigger_table(&detailed));
    }
    Ok(())
}

fn format_updated(updated: Option<i64>, fmt: &str) -> String {
    updated
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.with_timezone(&Local).format(fmt).to_string())
        .unwrap_or_default()
}

pub fn package_table(packages: &[Package]) -> String {
    let rows = packages
        .iter()
        .map(|p| {
            vec![
                format_updated(p.updated, "%m/%d %H:%M:%S"),
                if p.publish == Some(false) { "private" } else { "public" }.to_string(),
                if p.is_binding() { "binding" } else { "package" }.to_string(),
                p.version.clone(),
                format!("/{}/{}", p.namespace, p.name),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&[("Datetime", 16), ("Access", 9), ("Kind", 9), ("Version", 9), ("Packages", 50)], &rows)
}

pub fn trigger_table(triggers: &[Trigger]) -> String {
    let rows = triggers
        .iter()
        .map(|t| {
            vec![
                format_updated(t.updated, "%m/%d %H:%M:%S"),
                format!("{} active", t.active_rules()),
                t.version.clone(),
                format!("/{}/{}", t.namespace, t.name),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&[("Datetime", 16), ("Status", 18), ("Version", 9), ("Trigger", 50)], &rows)
}

/// Left-aligned columns, each at least its minimum width; the last column is not padded.
fn render_table(columns: &[(&str, usize)], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, (header, min))| {
            rows.iter()
                .map(|r| r[i].chars().count() + 1)
                .chain([header.len() + 1, *min])
                .max()
                .unwrap_or(*min)
        })
        .collect();

    let line = |cells: Vec<&str>| -> String {
        let last = cells.len() - 1;
        let mut s = String::new();
        for (i, cell) in cells.into_iter().enumerate() {
            if i == last {
                s.push_str(cell);
            } else {
                s.push_str(&format!("{cell:<w$}", w = widths[i]));
            }
        }
        s.trim_end().to_string() + "\n"
    };

    let mut out = line(columns.iter().map(|(h, _)| *h).collect());
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

// ------------------- activation logs -------------------

#[derive(Debug, Clone, Default)]
pub struct LogsArgs {
    pub activation_id: Option<String>,
    pub last: bool,
    pub count: u32,
    pub filter: Option<String>,
    pub slice: Option<String>,
    pub strip: bool,
    pub json: bool,
    pub quiet: bool,
}

pub async fn cmd_activation_logs(client: &Client, args: &LogsArgs) -> Result<()> {
    let slice = args.slice.as_deref().map(LogSlice::parse).transpose()?;
    if args.last && args.activation_id.is_some() {
        anyhow::bail!("Cannot specify an `activationId` with --last flag.");
    }

    let activations = match (&args.activation_id, args.last) {
        (Some(id), false) => vec![Activation { activation_id: id.clone(), name: None, version: None }],
        _ => {
            let limit = args.count.clamp(1, ACTIVATION_LIST_MAX);
            client.list_activations(limit, args.filter.as_deref()).await?
        }
    };

    let results = try_join_all(activations.iter().map(|a| client.activation_logs(&a.activation_id)))
        .await
        .context("failed to retrieve logs for activation")?;

    for (activation, result) in activations.iter().zip(results) {
        for line in render_logs(activation, &result, slice, args) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn render_logs(activation: &Activation, result: &ActivationLogs, slice: Option<LogSlice>, args: &LogsArgs) -> Vec<String> {
    let mut out = Vec::new();
    if !args.quiet {
        out.push(format!(
            "=== activation logs {} {}:{}",
            activation.activation_id,
            activation.name.as_deref().unwrap_or(""),
            activation.version.as_deref().unwrap_or("")
        ));
    }
    if result.logs.is_empty() {
        out.push("This activation does not have any logs.".to_string());
        return out;
    }

    let lines = match slice {
        Some(s) => s.apply(&result.logs),
        None => &result.logs[..],
    };
    if args.json && !args.strip {
        out.push(serde_json::to_string_pretty(lines).unwrap_or_default());
        return out;
    }
    for line in lines {
        let line = if args.strip { logs::strip_prefix(line) } else { line.as_str() };
        out.push(if args.json { logs::format_json_line(line) } else { line.to_string() });
    }
    out
}
