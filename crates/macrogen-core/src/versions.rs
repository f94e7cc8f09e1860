//! Version Compatibility
//!
//! Fifth pass: applies only to template names declared under multiple
//! versions. The first declaration is the reference; every other
//! version's declaration must carry each reference parameter under the
//! same name and a compatible kind. The direction is deliberate: a
//! template-set parameter may accept a superset of the reference's
//! allowed macros in another version, never a strict subset, so code
//! written against the reference contract stays valid everywhere.

use std::collections::HashSet;
use tracing::debug;

use crate::diagnostics::SemanticError;
use crate::model::{ParamKind, Template, TemplateId};
use crate::session::CompileSession;

pub fn run(session: &CompileSession) -> Result<(), SemanticError> {
    debug!("verifying version compatibility");
    for (name, instances) in session.versioned_names() {
        debug!(name, declarations = instances.len(), "checking versioned name");
        let reference = instances[0];
        for &other in &instances[1..] {
            verify_pair(session, reference, other)?;
        }
    }
    Ok(())
}

fn verify_pair(
    session: &CompileSession,
    reference_id: TemplateId,
    other_id: TemplateId,
) -> Result<(), SemanticError> {
    let reference = session.template(reference_id);
    let other = session.template(other_id);
    let version = version_label(session, other);

    for &param_id in &reference.params {
        let expected = session.param(param_id);

        let found = other
            .params
            .iter()
            .map(|&id| session.param(id))
            .find(|param| param.name.text == expected.name.text);
        let Some(found) = found else {
            return Err(SemanticError::missing_parameter(
                &expected.name,
                &version,
                &other.name,
            ));
        };

        match (&expected.kind, &found.kind) {
            (ParamKind::StringValue, ParamKind::StringValue) => {}
            (ParamKind::StringValue, ParamKind::TemplateSet(_)) => {
                return Err(SemanticError::incorrect_parameter_type(
                    &found.name,
                    &version,
                    &["String".to_owned()],
                ));
            }
            (ParamKind::TemplateSet(expected_set), found_kind) => {
                let expected_names: Vec<String> = expected_set
                    .iter()
                    .map(|&id| session.template(id).name.text.clone())
                    .collect();
                if !accepts_superset(session, &expected_names, found_kind) {
                    return Err(SemanticError::incorrect_parameter_type(
                        &found.name,
                        &version,
                        &expected_names,
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Does `found` allow at least every macro name in `expected`?
fn accepts_superset(session: &CompileSession, expected: &[String], found: &ParamKind) -> bool {
    let ParamKind::TemplateSet(found_set) = found else {
        return false;
    };
    let found_names: HashSet<&str> = found_set
        .iter()
        .map(|&id| session.template(id).name())
        .collect();
    expected
        .iter()
        .all(|name| found_names.contains(name.as_str()))
}

fn version_label(session: &CompileSession, template: &Template) -> String {
    template
        .versions
        .first()
        .map(|&id| session.version(id).name.text.clone())
        .unwrap_or_default()
}
