pub const METADATA_GRAPHQL_PATH: &str = "/api/metadata/graphql";
pub const VDS_QUERY_PATH: &str = "/api/v1/vizql-data-service/query-datasource";
pub const VDS_READ_METADATA_PATH: &str = "/api/v1/vizql-data-service/read-metadata";

pub const HEADER_TABLEAU_AUTH: &str = "X-Tableau-Auth";

pub const KEY_TASK: &str = "task";
pub const KEY_DATA_DICTIONARY: &str = "data_dictionary";
pub const KEY_META: &str = "meta";
pub const KEY_DATA_MODEL: &str = "data_model";
pub const KEY_PREVIOUS_CALL_ERROR: &str = "previous_call_error";
pub const KEY_PREVIOUS_VDS_PAYLOAD: &str = "previous_vds_payload";

/// Internal VDS metadata identifiers removed before a data model reaches a prompt.
pub const PRUNED_FIELD_KEYS: [&str; 2] = ["fieldName", "logicalTableId"];

/// Upper bound on sample values returned for a single field caption.
pub const SAMPLE_VALUE_LIMIT: usize = 4;

#[must_use]
pub fn signin_path(api_version: &str) -> String {
    format!("/api/{api_version}/auth/signin")
}

/// Joins `domain` and `path`, tolerating a trailing slash on the domain.
#[must_use]
pub fn endpoint(domain: &str, path: &str) -> String {
    format!("{}{path}", domain.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        assert_eq!(
            endpoint("https://10ax.online.tableau.com/", METADATA_GRAPHQL_PATH),
            "https://10ax.online.tableau.com/api/metadata/graphql"
        );
        assert_eq!(signin_path("3.22"), "/api/3.22/auth/signin");
    }
}
