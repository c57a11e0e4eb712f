use super::ModelSchema;
use crate::{
    error::ConfigurationError,
    role::{RoleFields, RoleRequest},
};
use std::collections::{BTreeMap, BTreeSet};

///
/// resolve_roles
///
/// Merge the bases' resolved role sets (reverse declaration order) with
/// this model's own deltas, for every role reachable from the model.
///
/// A base that never addressed a role contributes all of its field names,
/// or none when the role is empty by default. A role this model does not
/// address gains the model's own field names on the same terms.
///

pub(crate) fn resolve_roles(
    model: &str,
    bases: &[&ModelSchema],
    requests: &[RoleRequest],
    all: &BTreeSet<String>,
    own: &BTreeSet<String>,
) -> Result<Vec<RoleFields>, ConfigurationError> {
    let own_requests = collect_requests(model, requests, all)?;

    let mut roles: BTreeMap<usize, RoleFields> = BTreeMap::new();
    for base in bases {
        for finalized in base.roles() {
            roles
                .entry(finalized.role.code())
                .or_insert_with(|| RoleFields::new(finalized.role.clone()));
        }
    }
    for request in own_requests.values() {
        roles
            .entry(request.role.code())
            .or_insert_with(|| RoleFields::new(request.role.clone()));
    }

    for base in bases.iter().rev() {
        for (code, finalized) in &mut roles {
            if let Some(inherited) = base.roles().iter().find(|r| r.role.code() == *code) {
                finalized.fields.extend(inherited.fields.iter().cloned());
            } else if !finalized.role.is_empty_by_default() {
                finalized
                    .fields
                    .extend(base.fields().iter().map(|f| f.name.clone()));
            }
        }
    }

    for (code, finalized) in &mut roles {
        if let Some(request) = own_requests.get(code) {
            finalized.apply(request, all, own);
        } else if !finalized.role.is_empty_by_default() {
            finalized.fields.extend(own.iter().cloned());
        }
    }

    Ok(roles.into_values().collect())
}

// collect_requests
// one request per role; every named field must exist on the model
fn collect_requests<'a>(
    model: &str,
    requests: &'a [RoleRequest],
    all: &BTreeSet<String>,
) -> Result<BTreeMap<usize, &'a RoleRequest>, ConfigurationError> {
    let mut by_code = BTreeMap::new();

    for request in requests {
        if by_code.insert(request.role.code(), request).is_some() {
            return Err(ConfigurationError::new(format!(
                "Role {} configured for {model} multiple times",
                request.role.name()
            )));
        }
        if let Some(unknown) = request.fields.iter().find(|name| !all.contains(*name)) {
            return Err(ConfigurationError::new(format!(
                "Role {} whitelist/blacklist names `{unknown}`, which is not a field of {model}",
                request.role.name()
            )));
        }
    }

    Ok(by_code)
}
