use ferrum_terminology::models::Resource;
use serde_json::{json, Value as JsonValue};

/// Builder for CodeSystem resources
pub struct CodeSystemBuilder {
    id: String,
    url: Option<String>,
    content: String,
    version: Option<String>,
    name: Option<String>,
    title: Option<String>,
    concepts: Vec<JsonValue>,
}

impl CodeSystemBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
            content: "complete".to_string(),
            version: None,
            name: None,
            title: None,
            concepts: Vec::new(),
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn concept(mut self, concept: ConceptBuilder) -> Self {
        self.concepts.push(concept.build());
        self
    }

    pub fn build_json(self) -> JsonValue {
        let mut resource = json!({
            "resourceType": "CodeSystem",
            "id": self.id,
            "status": "active",
            "content": self.content,
        });

        if let Some(url) = self.url {
            resource["url"] = json!(url);
        }
        if let Some(version) = self.version {
            resource["version"] = json!(version);
        }
        if let Some(name) = self.name {
            resource["name"] = json!(name);
        }
        if let Some(title) = self.title {
            resource["title"] = json!(title);
        }
        if !self.concepts.is_empty() {
            resource["concept"] = JsonValue::Array(self.concepts);
        }

        resource
    }

    pub fn build(self) -> Resource {
        let id = self.id.clone();
        Resource::new("CodeSystem", id, self.build_json())
    }
}

/// Builder for `CodeSystem.concept` elements
pub struct ConceptBuilder {
    code: String,
    display: Option<String>,
    properties: Vec<JsonValue>,
    children: Vec<JsonValue>,
}

impl ConceptBuilder {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display: None,
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn not_selectable(mut self) -> Self {
        self.properties
            .push(json!({ "code": "notSelectable", "valueBoolean": true }));
        self
    }

    pub fn parent(mut self, code: impl Into<String>) -> Self {
        self.properties
            .push(json!({ "code": "parent", "valueCode": code.into() }));
        self
    }

    pub fn child(mut self, child: ConceptBuilder) -> Self {
        self.children.push(child.build());
        self
    }

    pub fn build(self) -> JsonValue {
        let mut concept = json!({ "code": self.code });
        if let Some(display) = self.display {
            concept["display"] = json!(display);
        }
        if !self.properties.is_empty() {
            concept["property"] = JsonValue::Array(self.properties);
        }
        if !self.children.is_empty() {
            concept["concept"] = JsonValue::Array(self.children);
        }
        concept
    }
}
