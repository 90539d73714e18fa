//! # Policy Subcommand
//!
//! `catgraph policy check` loads a policy document exactly as `serve` would
//! and cross-checks it against the gateway's field registry:
//!
//! - **unguarded**: a `Query`/`Mutation` field with no policy. It runs for
//!   every caller without limits.
//! - **unknown**: a policy for a field the gateway does not have. Usually
//!   a typo.
//!
//! Both are reported as warnings; `--strict` turns them into exit code 1.
//! `catgraph policy show` prints the compiled rule of every guarded field.
//! Without a path both use the built-in reference policy.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use catgraph_admission::{ConfigurationError, PolicySet};
use catgraph_api::graph::FieldRegistry;

use crate::EXIT_CONFIGURATION;

#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Validate a policy document and report field coverage.
    Check {
        /// Policy YAML. Defaults to the built-in reference policy.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Exit 1 on unguarded or unknown fields.
        #[arg(long)]
        strict: bool,
    },

    /// Print every guarded field and its rule.
    Show {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Execute the policy subcommand.
pub fn run_policy(args: &PolicyArgs) -> Result<u8> {
    match &args.command {
        PolicyCommand::Check { path, strict } => {
            let policies = match load(path.as_ref()) {
                Ok(p) => p,
                Err(e) => return Ok(report_invalid(&e)),
            };
            let coverage = Coverage::of(&policies, &catgraph_api::resolvers::registry());
            println!(
                "OK: {} guarded fields, roles: {}",
                policies.len(),
                policies.roles().collect::<Vec<_>>().join(", ")
            );
            for field in &coverage.unguarded {
                println!("warning: {field} has no policy and is unguarded");
            }
            for field in &coverage.unknown {
                println!("warning: policy for {field}, which the gateway does not serve");
            }
            Ok(if *strict && !coverage.is_clean() { 1 } else { 0 })
        }
        PolicyCommand::Show { path, json } => {
            let policies = match load(path.as_ref()) {
                Ok(p) => p,
                Err(e) => return Ok(report_invalid(&e)),
            };
            if *json {
                let rows = rows(&policies);
                let out = serde_json::to_string_pretty(&rows).context("failed to serialize policies")?;
                println!("{out}");
            } else {
                print!("{}", render_table(&policies));
            }
            Ok(0)
        }
    }
}

fn load(path: Option<&PathBuf>) -> Result<PolicySet, ConfigurationError> {
    match path {
        Some(path) => PolicySet::from_path(path),
        None => PolicySet::reference(),
    }
}

fn report_invalid(err: &ConfigurationError) -> u8 {
    eprintln!("error: invalid policy: {err}");
    EXIT_CONFIGURATION
}

/// Guarded-field mismatches between a policy set and the field registry.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    pub unguarded: Vec<String>,
    pub unknown: Vec<String>,
}

impl Coverage {
    pub fn of(policies: &PolicySet, registry: &FieldRegistry) -> Self {
        let unguarded = registry
            .paths()
            .into_iter()
            .filter(|path| {
                registry.get(path).is_some_and(|def| def.operation().is_some())
                    && policies.get(path).is_none()
            })
            .map(str::to_string)
            .collect();
        let unknown = policies
            .iter()
            .map(|p| p.field_path.to_string())
            .filter(|path| registry.get(path).is_none())
            .collect();
        Self { unguarded, unknown }
    }

    pub fn is_clean(&self) -> bool {
        self.unguarded.is_empty() && self.unknown.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct PolicyRow {
    pub field: String,
    pub rule: String,
}

pub fn rows(policies: &PolicySet) -> Vec<PolicyRow> {
    policies
        .iter()
        .map(|p| PolicyRow {
            field: p.field_path.to_string(),
            rule: p.rule.to_string(),
        })
        .collect()
}

/// Aligned `field  rule` lines, sorted by field.
pub fn render_table(policies: &PolicySet) -> String {
    let rows = rows(policies);
    let width = rows.iter().map(|r| r.field.len()).max().unwrap_or(0);
    rows.iter()
        .map(|r| format!("{:width$}  {}\n", r.field, r.rule))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reference_policy_covers_every_root_field() {
        let policies = PolicySet::reference().unwrap();
        let coverage = Coverage::of(&policies, &catgraph_api::resolvers::registry());
        assert!(coverage.is_clean(), "{coverage:?}");
    }

    #[test]
    fn coverage_reports_gaps_and_typos() {
        let policies = PolicySet::from_yaml_str(
            "fields:\n  Query.cats: allow\n  Query.kittens: allow\n",
        )
        .unwrap();
        let coverage = Coverage::of(&policies, &catgraph_api::resolvers::registry());
        assert_eq!(coverage.unknown, vec!["Query.kittens"]);
        assert!(coverage.unguarded.contains(&"Mutation.updateCat".to_string()));
        assert!(!coverage.unguarded.contains(&"Query.cats".to_string()));
        assert!(!coverage.unguarded.contains(&"Cat.owner".to_string()));
    }

    #[test]
    fn table_is_sorted_and_aligned() {
        let policies = PolicySet::from_yaml_str(
            "fields:\n  Query.users: deny\n  Query.cats: allow\n",
        )
        .unwrap();
        assert_eq!(render_table(&policies), "Query.cats   allow\nQuery.users  deny\n");
    }

    #[test]
    fn invalid_file_exits_with_configuration_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fields:\n  Query.cats: {{ use: missing }}").unwrap();
        let args = PolicyArgs {
            command: PolicyCommand::Check {
                path: Some(file.path().to_path_buf()),
                strict: false,
            },
        };
        assert_eq!(run_policy(&args).unwrap(), EXIT_CONFIGURATION);
    }

    #[test]
    fn strict_check_fails_on_gaps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fields:\n  Query.cats: allow").unwrap();
        let args = PolicyArgs {
            command: PolicyCommand::Check {
                path: Some(file.path().to_path_buf()),
                strict: true,
            },
        };
        assert_eq!(run_policy(&args).unwrap(), 1);
    }
}
