// Deterministic providers and PDF fixtures shared by unit tests

use std::sync::Mutex;

use crate::config::ProviderBackend;
use crate::embeddings::{EmbeddingProvider, ProviderIdentity};
use crate::generation::GenerationProvider;
use crate::{QaError, Result};

pub const DIMENSION: usize = 64;

/// Bag-of-words embedding: texts sharing words land close together
#[derive(Debug, Default)]
pub struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::Ollama,
            model: "keyword-test".to_string(),
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(keyword_vector(text))
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(2_166_136_261u32, |hash, b| {
                (hash ^ u32::from(b)).wrapping_mul(16_777_619)
            }) as usize
            % DIMENSION;
        vector[bucket] += 1.0;
    }
    // Keep every vector non-zero so cosine distance is defined
    vector[DIMENSION - 1] += 0.01;
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    vector.iter().map(|v| v / norm).collect()
}

/// Always fails, as an unreachable provider would
#[derive(Debug, Default)]
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::OpenAi,
            model: "unreachable".to_string(),
        }
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(QaError::EmbeddingProvider(
            "Could not connect to http://127.0.0.1:9/".to_string(),
        ))
    }
}

/// Answers with the question followed by the context it was given, recording each call
#[derive(Debug, Default)]
pub struct EchoGenerator {
    pub calls: Mutex<Vec<(String, String)>>,
}

impl EchoGenerator {
    pub fn contexts(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(context, _)| context.clone())
            .collect()
    }
}

impl GenerationProvider for EchoGenerator {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::Ollama,
            model: "echo-test".to_string(),
        }
    }

    fn generate(&self, context: &str, question: &str) -> Result<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((context.to_string(), question.to_string()));
        Ok(format!("Q: {} | C: {}", question, context))
    }
}

#[derive(Debug, Default)]
pub struct FailingGenerator;

impl GenerationProvider for FailingGenerator {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::OpenAi,
            model: "rate-limited".to_string(),
        }
    }

    fn generate(&self, _context: &str, _question: &str) -> Result<String> {
        Err(QaError::GenerationProvider(
            "HTTP 429: Rate limit reached".to_string(),
        ))
    }
}

/// Build a PDF with one page per entry; each entry's lines are drawn in Helvetica.
/// An empty entry produces a page with no text.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let mut objects: Vec<String> = Vec::new();

    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids, page_count
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

    for (i, text) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            content_id
        ));

        let mut stream = String::new();
        if !text.is_empty() {
            stream.push_str("BT\n/F1 12 Tf\n72 720 Td\n14 TL\n");
            for line in text.lines() {
                let escaped = line
                    .replace('\\', "\\\\")
                    .replace('(', "\\(")
                    .replace(')', "\\)");
                stream.push_str(&format!("({}) Tj\nT*\n", escaped));
            }
            stream.push_str("ET\n");
        }
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    out.push_str("0000000000 65535 f \n");
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    out.into_bytes()
}
