//! PDF packaging: each JPEG becomes one page whose media box equals the image
//! pixel size, with the image drawn full-bleed.

use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::fs;
use std::io::Write;
use std::sync::atomic::AtomicBool;

use super::check_cancel;
use crate::pipeline::StagedArtifact;

const IMAGE_NAME: &str = "Im0";

fn int(v: u32) -> Object {
    Object::Integer(i64::from(v))
}

/// Write a PDF with one page per artifact, in order. Returns the page count.
/// Stops with `Interrupted` as soon as `cancel` is set.
pub fn write_pdf<W: Write>(
    artifacts: &[StagedArtifact],
    out: &mut W,
    cancel: &AtomicBool,
) -> Result<usize> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        check_cancel(cancel)?;
        let page_id = add_page(&mut doc, pages_id, artifact)?;
        kids.push(page_id.into());
    }

    let count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save_to(out).context("failed to write PDF")?;
    Ok(count)
}

fn add_page(doc: &mut Document, pages_id: ObjectId, artifact: &StagedArtifact) -> Result<ObjectId> {
    let jpeg = fs::read(&artifact.path)
        .with_context(|| format!("failed to read staged image: {}", artifact.path.display()))?;
    let (w, h) = (artifact.width, artifact.height);

    // JPEG bytes go in as-is; DCTDecode lets the viewer decode them.
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => int(w),
            "Height" => int(h),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![int(w), int(0), int(0), int(h), int(0), int(0)],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().context("failed to encode page content")?,
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![int(0), int(0), int(w), int(h)],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_NAME => image_id,
            },
        },
    });
    Ok(page_id)
}
