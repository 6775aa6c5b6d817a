use crate::config::Environment;
use crate::domain::ports::Storage;
use crate::stack::template::Template;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub artifacts: BTreeMap<String, StackArtifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackArtifact {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub environment: String,
    pub template_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthOutput {
    pub template_file: String,
    pub manifest_file: String,
}

/// Writes synthesized stacks through a [`Storage`] backend.
pub struct App<S: Storage> {
    storage: S,
}

impl<S: Storage> App<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn template_file_name(stack_name: &str) -> String {
        format!("{}.template.json", stack_name)
    }

    pub async fn synth(
        &self,
        stack_name: &str,
        environment: &Environment,
        template: &Template,
    ) -> Result<SynthOutput> {
        let template_file = Self::template_file_name(stack_name);
        let body = template.to_json_pretty()?;
        self.storage
            .write_file(&template_file, body.as_bytes())
            .await?;
        tracing::debug!("Wrote {} ({} bytes)", template_file, body.len());

        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            stack_name.to_string(),
            StackArtifact {
                artifact_type: "aws:cloudformation:stack".to_string(),
                environment: environment.name(),
                template_file: template_file.clone(),
            },
        );
        let manifest = Manifest {
            version: MANIFEST_VERSION.to_string(),
            artifacts,
        };
        self.storage
            .write_file(MANIFEST_FILE, serde_json::to_string_pretty(&manifest)?.as_bytes())
            .await?;

        tracing::info!(
            "Stack {} synthesized for {}",
            stack_name,
            environment.name()
        );

        Ok(SynthOutput {
            template_file,
            manifest_file: MANIFEST_FILE.to_string(),
        })
    }

    pub async fn read_manifest(&self) -> Result<Manifest> {
        let data = self.storage.read_file(MANIFEST_FILE).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}
