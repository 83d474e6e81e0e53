use log::debug;
use std::path::Path;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("render {template}: {err}")]
    Render { template: String, err: tera::Error },

    #[error("write {path}: {err}")]
    WriteFile {
        err: std::io::Error,
        path: String,
    },
}

/// Templates compiled into the binary, as (name, content) pairs.
pub const TEMPLATES: &[(&str, &str)] = &[
    ("validator-values.yaml", include_str!("../templates/validator-values.yaml")),
    ("plugin-values.yaml", include_str!("../templates/plugin-values.yaml")),
    ("crs/aws.yaml", include_str!("../templates/crs/aws.yaml")),
    ("crs/azure.yaml", include_str!("../templates/crs/azure.yaml")),
    ("crs/network.yaml", include_str!("../templates/crs/network.yaml")),
    ("crs/oci.yaml", include_str!("../templates/crs/oci.yaml")),
    ("crs/vsphere.yaml", include_str!("../templates/crs/vsphere.yaml")),
    ("crs/maas.yaml", include_str!("../templates/crs/maas.yaml")),
    ("crs/aws-irsa.yaml", include_str!("../templates/crs/aws-irsa.yaml")),
    ("crs/aws-pod-identity.yaml", include_str!("../templates/crs/aws-pod-identity.yaml")),
];

/// Turns a named template and its arguments into manifest bytes.
pub trait Renderer {
    fn render(&self, template: &str, args: &Context) -> Result<Vec<u8>, Error>;
}

pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn from_embedded() -> Result<Self, Error> {
        let mut tera = Tera::default();
        for (name, content) in TEMPLATES {
            tera.add_raw_template(name, content).map_err(|err| Error::Render {
                template: name.to_string(),
                err,
            })?;
            debug!("Loaded embedded template {name}");
        }
        Ok(Self { tera })
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, template: &str, args: &Context) -> Result<Vec<u8>, Error> {
        self.tera
            .render(template, args)
            .map(String::into_bytes)
            .map_err(|err| Error::Render {
                template: template.to_string(),
                err,
            })
    }
}

/// Write rendered bytes to `path`, creating parent directories as needed.
/// Existing files are overwritten.
pub fn write(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let write_err = |err| Error::WriteFile {
        err,
        path: path.display().to_string(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, bytes).map_err(write_err)
}

/// Prefix every non-empty line with `spaces` spaces, so a YAML document can be
/// pasted under a key of a template.
pub fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_pads_each_line() {
        assert_eq!(indent("a: 1\nb:\n- c\n", 2), "  a: 1\n  b:\n  - c");
        assert_eq!(indent("x\n\ny", 4), "    x\n\n    y");
    }

    #[test]
    fn all_embedded_templates_load() {
        TemplateRenderer::from_embedded().unwrap();
    }

    #[test]
    fn rules_template_embeds_indented_spec() {
        let renderer = TemplateRenderer::from_embedded().unwrap();
        let mut args = Context::new();
        args.insert("name", "validator-plugin-oci-rules");
        args.insert("namespace", "validator");
        args.insert("spec", &indent("ociRegistryRules:\n- name: a\n", 2));
        let out = String::from_utf8(renderer.render("crs/oci.yaml", &args).unwrap()).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(doc["kind"].as_str(), Some("OciValidator"));
        assert_eq!(doc["metadata"]["namespace"].as_str(), Some("validator"));
        assert_eq!(doc["spec"]["ociRegistryRules"][0]["name"].as_str(), Some("a"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let renderer = TemplateRenderer::from_embedded().unwrap();
        assert!(renderer.render("nope.yaml", &Context::new()).is_err());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifests").join("x.yaml");
        write(&path, b"a: 1\n").unwrap();
        write(&path, b"a: 2\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a: 2\n");
    }
}
