//! Completeness Checks
//!
//! Final pass: unused parameters and unused text blocks. Under strict
//! mode the first finding aborts the run like any other semantic error;
//! otherwise findings are collected as warnings for the front end.
//!
//! Runs after the signature pass so that implicitly emitted text blocks
//! already count as used.

use tracing::{debug, warn};

use crate::diagnostics::{CompileError, SemanticError, Warning};
use crate::model::TemplateKind;
use crate::session::CompileSession;

pub fn run(session: &CompileSession, strict: bool) -> Result<Vec<Warning>, CompileError> {
    debug!(strict, "checking completeness");
    let mut warnings = Vec::new();

    for ordinal in 0..session.decl_count() {
        let template = session.template(session.decl_template(ordinal)?);

        if template.kind == TemplateKind::TextBlock && !template.is_used() {
            report(
                SemanticError::unused_text_block(&template.name),
                strict,
                &mut warnings,
            )?;
        }

        for &param_id in &template.params {
            let param = session.param(param_id);
            if !param.is_used() {
                report(
                    SemanticError::unused_parameter(&param.name),
                    strict,
                    &mut warnings,
                )?;
            }
        }
    }
    Ok(warnings)
}

fn report(
    error: SemanticError,
    strict: bool,
    warnings: &mut Vec<Warning>,
) -> Result<(), CompileError> {
    if strict {
        return Err(error.into());
    }
    warn!(%error, "completeness finding");
    warnings.push(Warning::new(error.code, error.message, error.span));
    Ok(())
}
