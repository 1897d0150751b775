use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of document classes the pipeline knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    Resume,
    ScienceArticle,
    TechnicalDocument,
}

impl DocumentClass {
    pub const ALL: [DocumentClass; 3] = [
        DocumentClass::Resume,
        DocumentClass::ScienceArticle,
        DocumentClass::TechnicalDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentClass::Resume => "resume",
            DocumentClass::ScienceArticle => "science_article",
            DocumentClass::TechnicalDocument => "technical_document",
        }
    }

    /// Name of the shared class-root node ("all resumes", ...)
    pub fn root_node_name(&self) -> &'static str {
        self.as_str()
    }

    /// Extra label put on a document's root entity
    pub fn root_label(&self) -> &'static str {
        match self {
            DocumentClass::Resume => "PERSON",
            DocumentClass::ScienceArticle => "ARTICLE",
            DocumentClass::TechnicalDocument => "SYSTEM",
        }
    }

    /// Fixed category buckets used by the category extraction mode
    pub fn categories(&self) -> &'static [Category] {
        match self {
            DocumentClass::Resume => &[
                Category::Skills,
                Category::Experience,
                Category::Education,
                Category::Certifications,
                Category::Publications,
                Category::PersonalDetails,
            ],
            DocumentClass::ScienceArticle => &[
                Category::Authors,
                Category::Affiliations,
                Category::Methods,
                Category::Datasets,
                Category::Findings,
                Category::Technologies,
            ],
            DocumentClass::TechnicalDocument => &[
                Category::Components,
                Category::Specifications,
                Category::Features,
                Category::Applications,
                Category::Requirements,
                Category::Performance,
            ],
        }
    }
}

impl fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown document class '{0}' (expected one of: resume, science_article, technical_document)")]
pub struct UnknownDocumentClass(pub String);

impl FromStr for DocumentClass {
    type Err = UnknownDocumentClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        DocumentClass::ALL
            .into_iter()
            .find(|class| class.as_str() == wanted)
            .ok_or_else(|| UnknownDocumentClass(s.to_string()))
    }
}

/// A category bucket: a per-class grouping of extracted items hanging off the root entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Skills,
    Experience,
    Education,
    Certifications,
    Publications,
    PersonalDetails,
    Authors,
    Affiliations,
    Methods,
    Datasets,
    Findings,
    Technologies,
    Components,
    Specifications,
    Features,
    Applications,
    Requirements,
    Performance,
}

impl Category {
    /// Key of the category list in the model response
    pub fn key(&self) -> &'static str {
        match self {
            Category::Skills => "skills",
            Category::Experience => "experience",
            Category::Education => "education",
            Category::Certifications => "certifications",
            Category::Publications => "publications",
            Category::PersonalDetails => "personal_details",
            Category::Authors => "authors",
            Category::Affiliations => "affiliations",
            Category::Methods => "methods",
            Category::Datasets => "datasets",
            Category::Findings => "findings",
            Category::Technologies => "technologies",
            Category::Components => "components",
            Category::Specifications => "specifications",
            Category::Features => "features",
            Category::Applications => "applications",
            Category::Requirements => "requirements",
            Category::Performance => "performance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Skills => "SKILLS",
            Category::Experience => "EXPERIENCE",
            Category::Education => "EDUCATION",
            Category::Certifications => "CERTIFICATIONS",
            Category::Publications => "PUBLICATIONS",
            Category::PersonalDetails => "PERSONAL_DETAILS",
            Category::Authors => "AUTHORS",
            Category::Affiliations => "AFFILIATIONS",
            Category::Methods => "METHODS",
            Category::Datasets => "DATASETS",
            Category::Findings => "FINDINGS",
            Category::Technologies => "TECHNOLOGIES",
            Category::Components => "COMPONENTS",
            Category::Specifications => "SPECIFICATIONS",
            Category::Features => "FEATURES",
            Category::Applications => "APPLICATIONS",
            Category::Requirements => "REQUIREMENTS",
            Category::Performance => "PERFORMANCE",
        }
    }

    /// Relationship from the root entity to this category's node
    pub fn relationship(&self) -> String {
        format!("HAS_{}", self.label())
    }

    /// Category nodes are scoped to their root entity, e.g. "Bob Smith_skills"
    pub fn node_name(&self, root_entity_name: &str) -> String {
        format!("{}_{}", root_entity_name, self.key())
    }
}

/// One ingested file. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub path: PathBuf,
    pub class: DocumentClass,
    pub text: String,
    pub doc_id: String,
}

impl Document {
    pub fn new(file_name: String, path: PathBuf, class: DocumentClass, text: String) -> Self {
        let doc_id = generate_doc_id(&file_name, &text);
        Self {
            file_name,
            path,
            class,
            text,
            doc_id,
        }
    }

    /// File type recorded on the File node (lowercased extension)
    pub fn file_type(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default()
    }
}

/// Generate a stable document ID from file name and content
pub fn generate_doc_id(file_name: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.as_bytes());
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}
