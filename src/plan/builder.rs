// src/plan/builder.rs

use std::ffi::OsString;

use tracing::debug;

use crate::config::ConfigSnapshot;
use crate::errors::ValidationError;
use crate::policy::{
    resolve_script_path, validate_branch_name, validate_flags, validate_interpreter,
    validate_option_value, with_unbuffered, InterpreterAllowlist, SanctionedDirs,
};

use super::args::tool_arguments;
use super::env::tool_environment;
use super::{InvocationPlan, PlanRequest};

/// Turns a [`ConfigSnapshot`] plus per-run inputs into an [`InvocationPlan`].
///
/// Building never spawns anything and never writes to disk. All validation
/// runs before the plan is assembled, so callers get either a complete plan
/// or the first rejection.
#[derive(Debug, Clone)]
pub struct PlanBuilder<'a> {
    snapshot: &'a ConfigSnapshot,
    sanctioned: SanctionedDirs,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(snapshot: &'a ConfigSnapshot) -> Self {
        Self {
            snapshot,
            sanctioned: SanctionedDirs::platform_default(),
        }
    }

    /// Override where scripts may live when no repository root is set.
    pub fn with_sanctioned_dirs(mut self, sanctioned: SanctionedDirs) -> Self {
        self.sanctioned = sanctioned;
        self
    }

    /// Build using the current process environment as the ambient one.
    pub fn build(&self, request: &PlanRequest) -> Result<InvocationPlan, ValidationError> {
        self.build_with_env(request, std::env::vars_os())
    }

    /// Build against an explicit ambient environment. Pairs that are not
    /// valid UTF-8 are skipped.
    pub fn build_with_env<I, K, V>(
        &self,
        request: &PlanRequest,
        ambient: I,
    ) -> Result<InvocationPlan, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let snapshot = self.snapshot;

        let mut words = snapshot.interpreter_command().split_whitespace();
        let binary = words.next().ok_or(ValidationError::EmptyInterpreter)?;
        let flags: Vec<String> = words.map(str::to_string).collect();

        let allowlist = InterpreterAllowlist::with_extra(snapshot.extra_interpreter_dirs())?;
        let executable = validate_interpreter(binary, &allowlist)?;
        validate_flags(&flags)?;
        let flags = with_unbuffered(flags);

        let script = resolve_script_path(snapshot.script(), snapshot.repo_root(), &self.sanctioned)?;
        let script = script
            .to_str()
            .ok_or_else(|| ValidationError::ScriptPath {
                path: script.clone(),
                reason: "not valid UTF-8".to_string(),
            })?
            .to_string();

        for branch in [snapshot.base_branch(), snapshot.branch()] {
            let branch = branch.trim();
            if !branch.is_empty() {
                validate_branch_name(branch)?;
            }
        }
        validate_option_value("--codex-model", snapshot.codex_model().trim())?;
        validate_option_value("--executor-policy", snapshot.executor().policy.trim())?;

        let tool_args = tool_arguments(snapshot, request)?;

        let mut arguments = Vec::with_capacity(flags.len() + 1 + tool_args.len());
        arguments.extend(flags);
        arguments.push(script);
        arguments.extend(tool_args);

        let ambient = ambient
            .into_iter()
            .filter_map(|(k, v)| {
                let key = k.into().into_string().ok()?;
                let value = v.into().into_string().ok()?;
                Some((key, value))
            })
            .collect();
        let environment = tool_environment(snapshot, ambient);

        debug!(
            executable = %executable,
            args = arguments.len(),
            env = environment.len(),
            "invocation plan built"
        );

        Ok(InvocationPlan {
            executable,
            arguments,
            environment,
        })
    }
}
