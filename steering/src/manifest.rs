/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! DASH content steering manifest: the JSON document returned to clients.

use serde::Serialize;

/// Logical name of the baseline pathway every clone is relative to.
pub const BASELINE_PATHWAY: &str = "cloud";

/// `URI-REPLACEMENT` inside a [PathwayClone].
#[derive(Debug, Clone, Serialize)]
pub struct UriReplacement {
    /// Replacement host for the cloned pathway.
    #[serde(rename = "HOST")]
    pub host: String,
}

/// One alternative origin ("pathway clone") for the baseline pathway.
#[derive(Debug, Clone, Serialize)]
pub struct PathwayClone {
    /// The pathway this clone is based on; always [BASELINE_PATHWAY].
    #[serde(rename = "BASE-ID")]
    pub base_id: String,
    /// Identifier of the cloned pathway; the arm name.
    #[serde(rename = "ID")]
    pub id: String,
    /// Replacement to apply for requests routed through this pathway.
    #[serde(rename = "URI-REPLACEMENT")]
    pub uri_replacement: UriReplacement,
}

/// A DASH content steering manifest.
#[derive(Debug, Clone, Serialize)]
pub struct SteeringManifest {
    /// Manifest schema version.
    #[serde(rename = "VERSION")]
    pub version: u32,
    /// Time-to-live, in seconds, before the client should re-fetch.
    #[serde(rename = "TTL")]
    pub ttl: u32,
    /// Absolute URI the client should re-request this manifest from.
    #[serde(rename = "RELOAD-URI")]
    pub reload_uri: String,
    /// Ranked pathway identifiers, most-preferred first, baseline last.
    #[serde(rename = "PATHWAY-PRIORITY")]
    pub pathway_priority: Vec<String>,
    /// Pathway clone definitions, omitted entirely when empty.
    #[serde(rename = "PATHWAY-CLONES", skip_serializing_if = "Vec::is_empty")]
    pub pathway_clones: Vec<PathwayClone>,
}

/// Default manifest TTL, in seconds.
const MANIFEST_TTL_SECONDS: u32 = 5;

/// Build the steering manifest for a ranked arm list.
///
/// `ranked_arms` becomes both the pathway-priority list (with
/// [BASELINE_PATHWAY] appended) and the set of pathway clones. An empty
/// `ranked_arms` yields a manifest with no [PathwayClone]s, per the
/// "omitted when the ranked list is empty" rule.
pub fn build_manifest(ranked_arms: &[String], reload_uri: String) -> SteeringManifest {
    let mut pathway_priority: Vec<String> = ranked_arms.to_vec();
    pathway_priority.push(BASELINE_PATHWAY.to_string());
    let pathway_clones = ranked_arms
        .iter()
        .map(|arm| PathwayClone {
            base_id: BASELINE_PATHWAY.to_string(),
            id: arm.clone(),
            uri_replacement: UriReplacement {
                host: format!("https://{arm}"),
            },
        })
        .collect();
    SteeringManifest {
        version: 1,
        ttl: MANIFEST_TTL_SECONDS,
        reload_uri,
        pathway_priority,
        pathway_clones,
    }
}

mod test {
    use super::*;

    #[test]
    fn test_pathway_priority_has_baseline_appended() {
        let manifest = build_manifest(
            &["c2".to_string(), "c1".to_string(), "c3".to_string()],
            "https://host/vod/manifest".to_string(),
        );
        assert_eq!(
            manifest.pathway_priority,
            vec!["c2", "c1", "c3", BASELINE_PATHWAY]
        );
        assert_eq!(manifest.pathway_clones.len(), 3);
    }

    #[test]
    fn test_empty_ranked_arms_yields_no_clones() {
        let manifest = build_manifest(&[], "https://host/vod/manifest".to_string());
        assert!(manifest.pathway_clones.is_empty());
        assert_eq!(manifest.pathway_priority, vec![BASELINE_PATHWAY]);
    }

    #[test]
    fn test_serializes_with_contractual_keys() {
        let manifest = build_manifest(&["c1".to_string()], "https://host/path".to_string());
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"VERSION\":1"));
        assert!(json.contains("\"PATHWAY-PRIORITY\""));
        assert!(json.contains("\"BASE-ID\":\"cloud\""));
    }
}
