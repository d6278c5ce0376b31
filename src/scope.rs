//! `/.default` scope-format convention used by upstream credential logic.

/// Suffix marking a resource identifier as being in scope format.
pub const DEFAULT_SUFFIX: &str = "/.default";

/// Whether `scope` carries the [`DEFAULT_SUFFIX`] marker.
pub fn is_default_scope(scope: &str) -> bool {
	scope.len() > DEFAULT_SUFFIX.len() && scope.ends_with(DEFAULT_SUFFIX)
}

/// Converts a resource identifier into scope format; scopes pass through unchanged.
pub fn resource_to_scope(resource: &str) -> String {
	if is_default_scope(resource) {
		return resource.to_owned();
	}

	format!("{}{DEFAULT_SUFFIX}", resource.trim_end_matches('/'))
}

/// Strips the [`DEFAULT_SUFFIX`] marker, returning the bare resource identifier.
pub fn scope_to_resource(scope: &str) -> &str {
	if is_default_scope(scope) { &scope[..scope.len() - DEFAULT_SUFFIX.len()] } else { scope }
}
