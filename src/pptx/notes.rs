//! Notes extraction and write support for presentation slides.
//!
//! Reading resolves the slide's notesSlide relationship and pulls the plain
//! text out of the body placeholder shape. Writing edits the placeholder's
//! paragraphs in place when the notes part exists; otherwise it provisions
//! the whole notes chain: the notesSlide part, its relationships back to the
//! slide and over to the notes master, and - when the package has never had
//! notes - the notes master itself with a cloned theme.

use crate::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use crate::opc::{OpcError, Package, PackURI, Relationships};
use crate::pptx::error::{PptxError, Result};
use crate::xml::XmlElement;
use log::debug;

const PRESENTATION_PART: &str = "/ppt/presentation.xml";
const NOTES_MASTER_PART: &str = "/ppt/notesMasters/notesMaster1.xml";
const THEME1_PART: &str = "/ppt/theme/theme1.xml";
const THEME2_PART: &str = "/ppt/theme/theme2.xml";

fn pack_uri(s: &str) -> Result<PackURI> {
    PackURI::new(s).map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))
}

/// Check whether a shape is the notes body placeholder
/// (`p:sp` holding `p:ph` with `type="body"`).
fn is_body_placeholder(sp: &XmlElement) -> bool {
    sp.is_named("p:sp")
        && sp.has_descendant(&|el| el.is_named("p:ph") && el.attr("type") == Some("body"))
}

/// Extract plain text from a notes slide root.
///
/// All body placeholder paragraphs are joined with newlines; each paragraph
/// is the concatenation of its text runs.
pub(crate) fn extract_notes_text(notes_root: &XmlElement) -> String {
    let mut paragraphs: Vec<String> = Vec::new();

    notes_root.walk(&mut |el| {
        if !is_body_placeholder(el) {
            return;
        }
        el.walk(&mut |p| {
            if !p.is_named("a:p") {
                return;
            }
            let mut para = String::new();
            p.walk(&mut |t| {
                if t.is_named("a:t") {
                    para.push_str(&t.text());
                }
            });
            paragraphs.push(para);
        });
    });

    paragraphs.join("\n")
}

/// Resolve the notes part for a slide, or None when the slide has no notes.
pub(crate) fn notes_part_for_slide(
    package: &Package,
    slide_part: &PackURI,
) -> Result<Option<PackURI>> {
    let rels_uri = slide_part
        .rels_uri()
        .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;

    let Some(blob) = package.try_read(&rels_uri) else {
        return Ok(None);
    };
    let rels = Relationships::from_xml(blob, slide_part.base_uri())?;

    match rels.by_type(rt::NOTES_SLIDE).next() {
        Some(rel) => Ok(Some(rel.target_partname()?)),
        None => Ok(None),
    }
}

/// Read the notes text for a slide; absent notes read as empty.
pub(crate) fn read_notes(package: &Package, slide_part: &PackURI) -> Result<String> {
    let Some(notes_uri) = notes_part_for_slide(package, slide_part)? else {
        return Ok(String::new());
    };

    let blob = package
        .try_read(&notes_uri)
        .ok_or_else(|| PptxError::TargetNotFound {
            part: slide_part.to_string(),
            target: notes_uri.to_string(),
        })?;

    let root = XmlElement::parse(blob)?;
    Ok(extract_notes_text(&root))
}

/// Write notes text for a slide, creating the notes part and its
/// relationship wiring when the slide has none yet.
pub(crate) fn write_notes(package: &mut Package, slide_part: &PackURI, text: &str) -> Result<()> {
    let rels_uri = slide_part
        .rels_uri()
        .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;

    let mut slide_rels = match package.try_read(&rels_uri) {
        Some(blob) => Relationships::from_xml(blob, slide_part.base_uri())?,
        None => Relationships::new(slide_part.base_uri().to_string()),
    };

    if let Some(rel) = slide_rels.by_type(rt::NOTES_SLIDE).next() {
        let notes_uri = rel.target_partname()?;
        let blob = package
            .try_read(&notes_uri)
            .ok_or_else(|| PptxError::TargetNotFound {
                part: rels_uri.to_string(),
                target: notes_uri.to_string(),
            })?;

        let mut root = XmlElement::parse(blob)?;
        set_notes_text(&mut root, text);
        package.write(&notes_uri, root.to_document_bytes());
        debug!("updated notes part {}", notes_uri);
        return Ok(());
    }

    let notes_master_uri = ensure_notes_master(package)?;

    let suffix = slide_part
        .stem()
        .strip_prefix("slide")
        .unwrap_or_else(|| slide_part.stem());
    let notes_uri = pack_uri(&format!("/ppt/notesSlides/notesSlide{}.xml", suffix))?;
    let notes_rels_uri = notes_uri
        .rels_uri()
        .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;

    let notes_root = build_notes_slide_xml(text);

    let mut notes_rels = Relationships::new(notes_uri.base_uri().to_string());
    notes_rels.add(
        rt::NOTES_MASTER,
        &notes_master_uri.relative_ref(notes_uri.base_uri()),
    );
    notes_rels.add(rt::SLIDE, &slide_part.relative_ref(notes_uri.base_uri()));

    slide_rels.add(rt::NOTES_SLIDE, &notes_uri.relative_ref(slide_part.base_uri()));

    package.add_part(&notes_uri, notes_root.to_document_bytes(), ct::PML_NOTES_SLIDE)?;
    package.write(&notes_rels_uri, notes_rels.to_xml());
    package.write(&rels_uri, slide_rels.to_xml());
    debug!("created notes part {} for slide {}", notes_uri, slide_part);

    Ok(())
}

/// Replace the body placeholder's paragraphs with plain text content.
///
/// Only `a:p` children of the placeholder `p:txBody` are touched; sibling
/// structure such as `a:bodyPr` is preserved.
fn set_notes_text(notes_root: &mut XmlElement, text: &str) {
    let tx_body = ensure_notes_body_tx_body(notes_root);

    tx_body.retain_children(|el| !el.is_named("a:p"));

    let paragraphs: Vec<&str> = if text.is_empty() {
        vec![""]
    } else {
        text.split('\n').collect()
    };

    for paragraph_text in paragraphs {
        let mut paragraph = XmlElement::new("a:p");
        if !paragraph_text.is_empty() {
            let mut run = XmlElement::new("a:r");
            let mut t = XmlElement::new("a:t");
            t.set_text(paragraph_text);
            run.push(t);
            paragraph.push(run);
        }
        tx_body.push(paragraph);
    }
}

/// Find or create the body placeholder's `p:txBody` under the shape tree.
fn ensure_notes_body_tx_body(notes_root: &mut XmlElement) -> &mut XmlElement {
    let c_sld = notes_root.ensure_child("p:cSld", &[]);
    let sp_tree = c_sld.ensure_child("p:spTree", &[]);

    if sp_tree.find_child(is_body_placeholder).is_none() {
        let shape_id = next_shape_id(sp_tree);
        sp_tree.push(build_body_placeholder_shape(shape_id));
    }

    // Safe to unwrap, the placeholder was just created if it was missing
    let body_shape = sp_tree.find_child_mut(is_body_placeholder).unwrap();
    body_shape.ensure_child("p:txBody", &[])
}

/// Next available `p:cNvPr/@id` within a shape tree.
fn next_shape_id(scope: &XmlElement) -> u32 {
    let mut max = 0u32;
    scope.walk(&mut |el| {
        if el.is_named("p:cNvPr")
            && let Some(id) = el.attr("id").and_then(|v| v.parse::<u32>().ok())
        {
            max = max.max(id);
        }
    });
    max + 1
}

/// Build the notes body placeholder shape (`p:sp` with `p:ph type="body"`).
fn build_body_placeholder_shape(shape_id: u32) -> XmlElement {
    let mut sp = XmlElement::new("p:sp");

    let mut nv_sp_pr = XmlElement::new("p:nvSpPr");
    nv_sp_pr.push(XmlElement::with_attrs(
        "p:cNvPr",
        &[("id", &shape_id.to_string()), ("name", "Notes Placeholder 2")],
    ));
    nv_sp_pr.push(XmlElement::new("p:cNvSpPr"));
    let mut nv_pr = XmlElement::new("p:nvPr");
    nv_pr.push(XmlElement::with_attrs("p:ph", &[("type", "body"), ("idx", "1")]));
    nv_sp_pr.push(nv_pr);
    sp.push(nv_sp_pr);

    sp.push(XmlElement::new("p:spPr"));
    sp.push(XmlElement::new("p:txBody"));

    sp
}

/// Build an empty group-shape header for a new shape tree.
fn build_group_shape_header(sp_tree: &mut XmlElement) {
    let mut nv_grp_sp_pr = XmlElement::new("p:nvGrpSpPr");
    nv_grp_sp_pr.push(XmlElement::with_attrs("p:cNvPr", &[("id", "1"), ("name", "")]));
    nv_grp_sp_pr.push(XmlElement::new("p:cNvGrpSpPr"));
    nv_grp_sp_pr.push(XmlElement::new("p:nvPr"));
    sp_tree.push(nv_grp_sp_pr);
    sp_tree.push(XmlElement::new("p:grpSpPr"));
}

/// Build a complete notes slide document with the given text.
fn build_notes_slide_xml(text: &str) -> XmlElement {
    let mut root = XmlElement::with_attrs(
        "p:notes",
        &[
            ("xmlns:a", ns::DML_MAIN),
            ("xmlns:p", ns::PML_MAIN),
            ("xmlns:r", ns::OFC_RELATIONSHIPS),
        ],
    );

    {
        let c_sld = root.ensure_child("p:cSld", &[]);
        let sp_tree = c_sld.ensure_child("p:spTree", &[]);
        build_group_shape_header(sp_tree);
        sp_tree.push(build_body_placeholder_shape(3));
    }

    let tx_body = ensure_notes_body_tx_body(&mut root);
    tx_body.insert(0, XmlElement::new("a:bodyPr"));

    set_notes_text(&mut root, text);
    root
}

/// Build a minimal notes master document.
fn build_notes_master_xml() -> XmlElement {
    let mut root = XmlElement::with_attrs(
        "p:notesMaster",
        &[
            ("xmlns:a", ns::DML_MAIN),
            ("xmlns:p", ns::PML_MAIN),
            ("xmlns:r", ns::OFC_RELATIONSHIPS),
        ],
    );

    {
        let c_sld = root.ensure_child("p:cSld", &[]);
        let sp_tree = c_sld.ensure_child("p:spTree", &[]);
        build_group_shape_header(sp_tree);
    }

    root.push(XmlElement::with_attrs(
        "p:clrMap",
        &[
            ("bg1", "lt1"),
            ("tx1", "dk1"),
            ("bg2", "lt2"),
            ("tx2", "dk2"),
            ("accent1", "accent1"),
            ("accent2", "accent2"),
            ("accent3", "accent3"),
            ("accent4", "accent4"),
            ("accent5", "accent5"),
            ("accent6", "accent6"),
            ("hlink", "hlink"),
            ("folHlink", "folHlink"),
        ],
    ));

    root
}

/// Ensure the package has a notes master wired into the presentation.
///
/// Returns the notes master part name. Creates the master part, a theme
/// clone, the presentation relationship, and the `p:notesMasterIdLst` entry
/// as needed.
fn ensure_notes_master(package: &mut Package) -> Result<PackURI> {
    let pres_uri = pack_uri(PRESENTATION_PART)?;
    let pres_rels_uri = pres_uri
        .rels_uri()
        .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;

    let pres_blob = package
        .try_read(&pres_uri)
        .ok_or_else(|| PptxError::InvalidPresentation(format!("missing {}", PRESENTATION_PART)))?;
    let mut pres_root = XmlElement::parse(pres_blob)?;

    let rels_blob = package
        .try_read(&pres_rels_uri)
        .ok_or_else(|| PptxError::RelsNotFound(pres_rels_uri.to_string()))?;
    let mut pres_rels = Relationships::from_xml(rels_blob, pres_uri.base_uri())?;

    let declared_rid = find_notes_master_rid(&pres_root);

    let notes_master_uri = if let Some(r_id) = declared_rid {
        let rel = pres_rels
            .get(&r_id)
            .ok_or_else(|| PptxError::RelationshipIdNotFound {
                part: pres_rels_uri.to_string(),
                r_id: r_id.clone(),
            })?;
        rel.target_partname()?
    } else {
        let existing = match pres_rels.by_type(rt::NOTES_MASTER).next() {
            Some(rel) => Some((rel.r_id().to_string(), rel.target_partname()?)),
            None => None,
        };
        let (r_id, target) = match existing {
            Some(pair) => pair,
            None => {
                let target = pack_uri(NOTES_MASTER_PART)?;
                let r_id = pres_rels.add(rt::NOTES_MASTER, &target.relative_ref(pres_uri.base_uri()));
                package.write(&pres_rels_uri, pres_rels.to_xml());
                (r_id, target)
            },
        };

        append_notes_master_id(&mut pres_root, &r_id);
        package.write(&pres_uri, pres_root.to_document_bytes());
        target
    };

    let theme_uri = ensure_notes_master_files(package, &notes_master_uri)?;

    package.ensure_override_content_type(notes_master_uri.as_str(), ct::PML_NOTES_MASTER)?;
    package.ensure_override_content_type(theme_uri.as_str(), ct::OFC_THEME)?;

    Ok(notes_master_uri)
}

/// Find the rId of the presentation's declared notes master, if any.
fn find_notes_master_rid(pres_root: &XmlElement) -> Option<String> {
    let mut found = None;
    pres_root.walk(&mut |el| {
        if found.is_none()
            && el.is_named("p:notesMasterId")
            && let Some(r_id) = el.attr("r:id")
        {
            found = Some(r_id.to_string());
        }
    });
    found
}

/// Append a `p:notesMasterId` entry to the presentation root, creating the
/// `p:notesMasterIdLst` right after `p:sldMasterIdLst` when absent.
fn append_notes_master_id(pres_root: &mut XmlElement, r_id: &str) {
    if pres_root.child("p:notesMasterIdLst").is_none() {
        let pos = pres_root
            .position_of_child(|el| el.is_named("p:sldMasterIdLst"))
            .map(|i| i + 1)
            .unwrap_or(1);
        pres_root.insert(pos, XmlElement::new("p:notesMasterIdLst"));
    }

    let id_lst = pres_root.child_mut("p:notesMasterIdLst").unwrap();
    id_lst.push(XmlElement::with_attrs("p:notesMasterId", &[("r:id", r_id)]));
}

/// Ensure the notes master part, its theme relationship, and the theme part
/// exist; returns the theme part name.
fn ensure_notes_master_files(package: &mut Package, notes_master_uri: &PackURI) -> Result<PackURI> {
    if !package.contains(notes_master_uri) {
        package.write(notes_master_uri, build_notes_master_xml().to_document_bytes());
    }

    let nm_rels_uri = notes_master_uri
        .rels_uri()
        .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;
    let mut nm_rels = match package.try_read(&nm_rels_uri) {
        Some(blob) => Relationships::from_xml(blob, notes_master_uri.base_uri())?,
        None => Relationships::new(notes_master_uri.base_uri().to_string()),
    };

    if let Some(rel) = nm_rels.by_type(rt::THEME).next() {
        return Ok(rel.target_partname()?);
    }

    let theme2_uri = pack_uri(THEME2_PART)?;
    if !package.contains(&theme2_uri) {
        let theme1_uri = pack_uri(THEME1_PART)?;
        let theme1 = package
            .try_read(&theme1_uri)
            .ok_or_else(|| {
                PptxError::InvalidPresentation(format!(
                    "required theme part {} is missing; cannot create theme2.xml",
                    THEME1_PART
                ))
            })?
            .to_vec();
        package.write(&theme2_uri, theme1);
    }

    nm_rels.add(rt::THEME, &theme2_uri.relative_ref(notes_master_uri.base_uri()));
    package.write(&nm_rels_uri, nm_rels.to_xml());

    Ok(theme2_uri)
}
