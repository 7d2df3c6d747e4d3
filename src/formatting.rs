use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::models::SupportingDoc;
use crate::rag::index::RetrievalResult;
use crate::rag::processor::SupportingImages;

pub const RELATED_DOCS_PREFIX: &str = "**Related docs**: ";

fn related_docs_text(caption: &str) -> String {
    format!("{}{}\n\n", RELATED_DOCS_PREFIX, caption)
}

/// Drain the processor output into response entries.
pub fn supporting_docs(images: SupportingImages) -> Vec<SupportingDoc> {
    images
        .map(|item| SupportingDoc {
            full_text: related_docs_text(&item.caption),
            image: item.image.map(|bytes| STANDARD.encode(bytes)),
        })
        .collect()
}

/// Text-only entries, used when no image processor is configured.
pub fn text_docs(docs: &[RetrievalResult]) -> Vec<SupportingDoc> {
    docs.iter()
        .map(|doc| SupportingDoc {
            full_text: related_docs_text(&doc.chunk.text),
            image: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::processor::SupportingImage;

    fn image(caption: &str, bytes: Option<&[u8]>) -> SupportingImage {
        SupportingImage {
            caption: caption.to_string(),
            filename: "guide.pdf".to_string(),
            page_number: 1,
            image: bytes.map(<[u8]>::to_vec),
            highlights: Vec::new(),
        }
    }

    #[test]
    fn test_supporting_docs_encode_images() {
        let items = vec![image("Coverage starts day one.", Some(b"abc")), image("No image", None)];
        let docs = supporting_docs(Box::new(items.into_iter()));

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].full_text, "**Related docs**: Coverage starts day one.\n\n");
        assert_eq!(docs[0].image.as_deref(), Some("YWJj"));
        assert!(docs[1].image.is_none());
    }

    #[test]
    fn test_image_field_omitted_when_absent() {
        let docs = supporting_docs(Box::new(vec![image("x", None)].into_iter()));
        let json = serde_json::to_value(&docs[0]).unwrap();
        assert!(json.get("image").is_none());
        assert_eq!(json["full_text"], "**Related docs**: x\n\n");
    }
}
