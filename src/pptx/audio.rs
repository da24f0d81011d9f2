//! Audio embedding for slides: media part, relationship entries, the
//! narration icon picture shape, and the autoplay timing nodes.
//!
//! Replacement is idempotent: an existing attachment is stripped first (pic
//! shape, timing nodes targeting it, relationship entries, and the media
//! part when nothing else references it), so re-attaching never leaves
//! orphaned parts or duplicate triggers.
//!
//! The timing tree is built with find-or-create semantics at every level of
//! `p:timing/p:tnLst/p:par/p:cTn/p:childTnLst` and the main sequence below
//! it. A slide whose tree lacks any of these wrappers gets them synthesized;
//! wrappers that exist are reused, and unrelated timing children are left
//! untouched.
//!
//! No package mutation happens until every edit has been computed; a failure
//! while computing leaves the package exactly as it was.

use crate::opc::constants::{content_type as ct, namespace as ns, relationship_type as rt};
use crate::opc::{OpcError, Package, PackURI, Relationships};
use crate::pptx::error::{PptxError, Result};
use crate::pptx::presentation::Slide;
use crate::xml::XmlElement;
use log::{debug, info};
use uuid::Uuid;

const MEDIA_DIR: &str = "/ppt/media";

const DEFAULT_ICON_X: i64 = 5_730_875;
const DEFAULT_ICON_Y: i64 = 3_063_875;
const DEFAULT_ICON_CX: i64 = 730_250;
const DEFAULT_ICON_CY: i64 = 730_250;

const DEFAULT_VOLUME: u32 = 80_000;

/// Bundled narration icon shown as the audio click target on the slide.
static NARRATION_ICON: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d,
    0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x10,
    0x08, 0x04, 0x00, 0x00, 0x00, 0xb5, 0xfa, 0x37, 0xea, 0x00, 0x00, 0x00,
    0x38, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x60, 0xa0, 0x32, 0x70,
    0xf8, 0x4f, 0x40, 0x1a, 0xaf, 0x02, 0x90, 0x34, 0x44, 0x01, 0x86, 0x32,
    0x88, 0x14, 0x42, 0x01, 0x86, 0x12, 0x54, 0x05, 0x58, 0x4c, 0x41, 0x37,
    0x01, 0xa1, 0x8c, 0x3c, 0x05, 0x38, 0x1c, 0x8a, 0xec, 0x0b, 0x9c, 0xe1,
    0x81, 0xd3, 0x9b, 0x44, 0x87, 0x24, 0x6d, 0x00, 0x00, 0x5a, 0x89, 0x43,
    0x4b, 0x97, 0xc5, 0xe4, 0x7c, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e,
    0x44, 0xae, 0x42, 0x60, 0x82,
];

struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    fn starting_after(max: u32) -> Self {
        Self { next: max + 1 }
    }

    fn next(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

fn pack_uri(s: &str) -> Result<PackURI> {
    PackURI::new(s).map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))
}

/// File extension for an audio MIME type.
fn ext_for_mime(mime: &str) -> &'static str {
    match mime {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        _ => "mp3",
    }
}

/// Attach (or replace) a narration clip on a slide.
///
/// Returns the rId of the new audio relationship in the slide's rels file.
pub(crate) fn attach_audio(
    package: &mut Package,
    slide: &mut Slide,
    audio_bytes: &[u8],
    mime: &str,
) -> Result<String> {
    let slide_part = slide.part().clone();
    let slide_blob = package.read(&slide_part)?;
    let mut slide_root = XmlElement::parse(slide_blob)?;

    let rels_uri = slide_part
        .rels_uri()
        .map_err(|e| PptxError::Opc(OpcError::InvalidPackUri(e)))?;
    let mut rels = match package.try_read(&rels_uri) {
        Some(blob) => Relationships::from_xml(blob, slide_part.base_uri())?,
        None => Relationships::new(slide_part.base_uri().to_string()),
    };

    let mut removals: Vec<PackURI> = Vec::new();

    if let Some(old_rid) = slide.audio_rel_id().map(str::to_string) {
        strip_existing_audio(
            package,
            &mut slide_root,
            &mut rels,
            &rels_uri,
            &old_rid,
            &mut removals,
        )?;
    }

    let ext = ext_for_mime(mime);
    let (media_uri, media_is_new) =
        find_or_allocate_media(package, "media", ext, audio_bytes, &removals)?;
    let (icon_uri, icon_is_new) =
        find_or_allocate_media(package, "image", "png", NARRATION_ICON, &removals)?;

    let media_target = media_uri.relative_ref(slide_part.base_uri());
    let icon_target = icon_uri.relative_ref(slide_part.base_uri());

    let media_rid = rels.get_or_add(rt::MEDIA, &media_target);
    let audio_rid = rels.get_or_add(rt::AUDIO, &media_target);
    let image_rid = rels.get_or_add(rt::IMAGE, &icon_target);

    for (decl, uri) in [
        ("xmlns:a", ns::DML_MAIN),
        ("xmlns:r", ns::OFC_RELATIONSHIPS),
        ("xmlns:p14", ns::PML_2010),
        ("xmlns:a16", ns::DML_2014),
    ] {
        if slide_root.attr(decl).is_none() {
            slide_root.set_attr(decl, uri);
        }
    }

    let spid = max_shape_id(&slide_root) + 1;
    let pic = build_pic_element(spid, media_uri.stem(), &media_rid, &audio_rid, &image_rid);
    {
        let sp_tree = slide_root
            .ensure_child("p:cSld", &[])
            .ensure_child("p:spTree", &[]);
        sp_tree.push(pic);
    }

    let mut ids = IdAllocator::starting_after(max_ctn_id(&slide_root));
    ensure_timing_scaffold(&mut slide_root, &mut ids);

    let delay = compute_next_delay(command_parent(&slide_root));
    let command = build_command_node(spid, delay, &mut ids);
    command_parent_mut(&mut slide_root).insert(0, command);

    let audio_node = build_audio_node(spid, ids.next());
    audio_parent_mut(&mut slide_root).insert(0, audio_node);

    // Commit phase: everything above worked on detached copies
    for uri in &removals {
        package.remove_part(uri)?;
    }
    if media_is_new {
        package.add_part(&media_uri, audio_bytes.to_vec(), mime)?;
    }
    if icon_is_new {
        package.add_part(&icon_uri, NARRATION_ICON.to_vec(), ct::PNG)?;
    }
    package.write(&rels_uri, rels.to_xml());
    package.write(&slide_part, slide_root.to_document_bytes());

    slide.set_audio_rel_id(Some(audio_rid.clone()));
    info!(
        "attached {} ({} bytes) to slide {} as {}",
        media_uri,
        audio_bytes.len(),
        slide_part,
        audio_rid
    );
    Ok(audio_rid)
}

/// Remove a previous attachment: pic shape, timing nodes, relationship
/// entries, and the media part when no other relationship references it.
fn strip_existing_audio(
    package: &Package,
    slide_root: &mut XmlElement,
    rels: &mut Relationships,
    rels_uri: &PackURI,
    old_rid: &str,
    removals: &mut Vec<PackURI>,
) -> Result<()> {
    let media_part = rels
        .get(old_rid)
        .map(|rel| rel.target_partname())
        .transpose()?;

    let spid = find_audio_pic_spid(slide_root, old_rid);

    if let Some(sp_tree) = slide_root
        .child_mut("p:cSld")
        .and_then(|c| c.child_mut("p:spTree"))
    {
        sp_tree.retain_children(|el| {
            !(el.is_named("p:pic")
                && el.has_descendant(&|d| {
                    d.is_named("a:audioFile") && d.attr("r:link") == Some(old_rid)
                }))
        });
    }

    if let Some(spid) = spid {
        strip_timing_nodes(slide_root, &spid);
    }

    rels.remove(old_rid);

    if let Some(media_part) = media_part {
        let media_target = media_part.relative_ref(rels_uri_owner_base(rels_uri));
        while let Some(r_id) = rels
            .find_by_type_and_target(rt::MEDIA, &media_target)
            .map(str::to_string)
        {
            rels.remove(&r_id);
        }

        if !part_referenced_elsewhere(package, &media_part, rels_uri)? {
            removals.push(media_part);
        }
    }

    // Drop image relationships no longer referenced by any shape
    let orphaned: Vec<String> = rels
        .by_type(rt::IMAGE)
        .filter(|rel| !rid_referenced(slide_root, rel.r_id()))
        .map(|rel| rel.r_id().to_string())
        .collect();
    for r_id in orphaned {
        rels.remove(&r_id);
    }

    debug!("stripped previous audio relationship {}", old_rid);
    Ok(())
}

/// Shape id of the pic wired to the given audio relationship.
fn find_audio_pic_spid(slide_root: &XmlElement, audio_rid: &str) -> Option<String> {
    let mut spid = None;
    slide_root.walk(&mut |el| {
        if spid.is_some() || !el.is_named("p:pic") {
            return;
        }
        let references_audio = el.has_descendant(&|d| {
            d.is_named("a:audioFile") && d.attr("r:link") == Some(audio_rid)
        });
        if references_audio {
            el.walk(&mut |d| {
                if spid.is_none()
                    && d.is_named("p:cNvPr")
                    && let Some(id) = d.attr("id")
                {
                    spid = Some(id.to_string());
                }
            });
        }
    });
    spid
}

/// Remove the audio media node and the autoplay command targeting a shape.
fn strip_timing_nodes(slide_root: &mut XmlElement, spid: &str) {
    let targets_shape = |el: &XmlElement| {
        el.has_descendant(&|d| d.is_named("p:spTgt") && d.attr("spid") == Some(spid))
    };

    if let Some(audio_parent) = slide_root
        .child_mut("p:timing")
        .and_then(|t| t.child_mut("p:tnLst"))
        .and_then(|t| t.child_mut("p:par"))
        .and_then(|t| t.child_mut("p:cTn"))
        .and_then(|t| t.child_mut("p:childTnLst"))
    {
        audio_parent.retain_children(|el| !(el.is_named("p:audio") && targets_shape(el)));

        if let Some(command_parent) = audio_parent
            .child_mut("p:seq")
            .and_then(|s| s.child_mut("p:cTn"))
            .and_then(|s| s.child_mut("p:childTnLst"))
            .and_then(|s| s.child_mut("p:par"))
            .and_then(|s| s.child_mut("p:cTn"))
            .and_then(|s| s.child_mut("p:childTnLst"))
        {
            command_parent.retain_children(|el| !(el.is_named("p:par") && targets_shape(el)));
        }
    }
}

/// Whether any attribute in the tree still references the relationship id.
fn rid_referenced(root: &XmlElement, r_id: &str) -> bool {
    root.has_descendant(&|el| {
        ["r:embed", "r:link", "r:id"]
            .iter()
            .any(|key| el.attr(key) == Some(r_id))
    })
}

/// Base URI of the part owning a `.rels` file
/// ("/ppt/slides/_rels/slide1.xml.rels" -> "/ppt/slides").
fn rels_uri_owner_base(rels_uri: &PackURI) -> &str {
    let dir = rels_uri.base_uri();
    dir.strip_suffix("/_rels").unwrap_or(dir)
}

/// Whether any relationship file other than `exclude` targets the part.
fn part_referenced_elsewhere(
    package: &Package,
    part: &PackURI,
    exclude: &PackURI,
) -> Result<bool> {
    for name in package.part_names() {
        if name.ext() != "rels" || name == exclude {
            continue;
        }
        let Some(blob) = package.try_read(name) else {
            continue;
        };
        let rels = Relationships::from_xml(blob, rels_uri_owner_base(name))?;
        for rel in rels.iter() {
            if !rel.is_external()
                && let Ok(target) = rel.target_partname()
                && target == *part
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Find a media part with identical payload, or allocate the next free name.
///
/// Allocation takes the maximum numeric suffix over both existing part names
/// and every relationship target in the package, so a name still referenced
/// anywhere is never reissued.
fn find_or_allocate_media(
    package: &Package,
    prefix: &str,
    ext: &str,
    payload: &[u8],
    removals: &[PackURI],
) -> Result<(PackURI, bool)> {
    let suffix_of = |uri: &PackURI| -> Option<u32> {
        if uri.base_uri() != MEDIA_DIR || uri.ext() != ext {
            return None;
        }
        uri.stem()
            .strip_prefix(prefix)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<u32>().ok())
    };

    let mut max_n = 0u32;

    for name in package.part_names() {
        let Some(n) = suffix_of(name) else { continue };
        max_n = max_n.max(n);
        if !removals.contains(name) && package.try_read(name) == Some(payload) {
            return Ok((name.clone(), false));
        }
    }

    for name in package.part_names() {
        if name.ext() != "rels" {
            continue;
        }
        let Some(blob) = package.try_read(name) else {
            continue;
        };
        let rels = Relationships::from_xml(blob, rels_uri_owner_base(name))?;
        for rel in rels.iter() {
            if rel.is_external() {
                continue;
            }
            if let Ok(target) = rel.target_partname()
                && let Some(n) = suffix_of(&target)
            {
                max_n = max_n.max(n);
            }
        }
    }

    let uri = pack_uri(&format!("{}/{}{}.{}", MEDIA_DIR, prefix, max_n + 1, ext))?;
    Ok((uri, true))
}

/// Maximum shape/target id in the slide (`p:cNvPr/@id`, `p:spTgt/@spid`).
fn max_shape_id(slide_root: &XmlElement) -> u32 {
    let mut max = 0u32;
    slide_root.walk(&mut |el| {
        let value = if el.is_named("p:cNvPr") {
            el.attr("id")
        } else if el.is_named("p:spTgt") {
            el.attr("spid")
        } else {
            None
        };
        if let Some(id) = value.and_then(|v| v.parse::<u32>().ok()) {
            max = max.max(id);
        }
    });
    max
}

/// Maximum timing node id in the slide (`p:cTn/@id`).
fn max_ctn_id(slide_root: &XmlElement) -> u32 {
    let mut max = 0u32;
    slide_root.walk(&mut |el| {
        if el.is_named("p:cTn")
            && let Some(id) = el.attr("id").and_then(|v| v.parse::<u32>().ok())
        {
            max = max.max(id);
        }
    });
    max
}

/// Build the `p:pic` shape for the narration icon.
fn build_pic_element(
    spid: u32,
    name: &str,
    media_rid: &str,
    audio_rid: &str,
    image_rid: &str,
) -> XmlElement {
    let mut pic = XmlElement::new("p:pic");

    let mut nv_pic_pr = XmlElement::new("p:nvPicPr");
    let mut c_nv_pr = XmlElement::with_attrs(
        "p:cNvPr",
        &[("id", &spid.to_string()), ("name", name)],
    );
    c_nv_pr.push(XmlElement::with_attrs(
        "a:hlinkClick",
        &[("r:id", ""), ("action", "ppaction://media")],
    ));
    let mut ext_lst = XmlElement::new("a:extLst");
    let mut a_ext = XmlElement::with_attrs(
        "a:ext",
        &[("uri", "{FF2B5EF4-FFF2-40B4-BE49-F238E27FC236}")],
    );
    let creation_id = format!("{{{}}}", Uuid::new_v4().to_string().to_uppercase());
    a_ext.push(XmlElement::with_attrs("a16:creationId", &[("id", &creation_id)]));
    ext_lst.push(a_ext);
    c_nv_pr.push(ext_lst);
    nv_pic_pr.push(c_nv_pr);

    let mut c_nv_pic_pr = XmlElement::new("p:cNvPicPr");
    c_nv_pic_pr.push(XmlElement::with_attrs("a:picLocks", &[("noChangeAspect", "1")]));
    nv_pic_pr.push(c_nv_pic_pr);

    let mut nv_pr = XmlElement::new("p:nvPr");
    nv_pr.push(XmlElement::with_attrs("a:audioFile", &[("r:link", audio_rid)]));
    let mut nv_ext_lst = XmlElement::new("p:extLst");
    let mut p_ext = XmlElement::with_attrs(
        "p:ext",
        &[("uri", "{DAA4B4D4-6D71-4841-9C94-3DE7FCFB9230}")],
    );
    p_ext.push(XmlElement::with_attrs("p14:media", &[("r:embed", media_rid)]));
    nv_ext_lst.push(p_ext);
    nv_pr.push(nv_ext_lst);
    nv_pic_pr.push(nv_pr);
    pic.push(nv_pic_pr);

    let mut blip_fill = XmlElement::new("p:blipFill");
    blip_fill.push(XmlElement::with_attrs("a:blip", &[("r:embed", image_rid)]));
    let mut stretch = XmlElement::new("a:stretch");
    stretch.push(XmlElement::new("a:fillRect"));
    blip_fill.push(stretch);
    pic.push(blip_fill);

    let mut sp_pr = XmlElement::new("p:spPr");
    let mut xfrm = XmlElement::new("a:xfrm");
    xfrm.push(XmlElement::with_attrs(
        "a:off",
        &[("x", &DEFAULT_ICON_X.to_string()), ("y", &DEFAULT_ICON_Y.to_string())],
    ));
    xfrm.push(XmlElement::with_attrs(
        "a:ext",
        &[("cx", &DEFAULT_ICON_CX.to_string()), ("cy", &DEFAULT_ICON_CY.to_string())],
    ));
    sp_pr.push(xfrm);
    let mut prst_geom = XmlElement::with_attrs("a:prstGeom", &[("prst", "rect")]);
    prst_geom.push(XmlElement::new("a:avLst"));
    sp_pr.push(prst_geom);
    pic.push(sp_pr);

    pic
}

/// Ensure the timing tree scaffold exists, assigning ids to any `p:cTn`
/// created (or found) without one.
///
/// Path: `p:timing/p:tnLst/p:par/p:cTn/p:childTnLst`, then the main
/// sequence `p:seq/p:cTn/p:childTnLst/p:par/p:cTn/p:childTnLst` below it.
fn ensure_timing_scaffold(slide_root: &mut XmlElement, ids: &mut IdAllocator) {
    let timing = slide_root.ensure_child("p:timing", &[]);
    let tn_lst = timing.ensure_child("p:tnLst", &[]);
    let par = tn_lst.ensure_child("p:par", &[]);
    let c_tn_root = par.ensure_child(
        "p:cTn",
        &[("dur", "indefinite"), ("restart", "never"), ("nodeType", "tmRoot")],
    );
    if c_tn_root.attr("id").is_none() {
        let id = ids.next().to_string();
        c_tn_root.set_attr("id", &id);
    }
    let child_tn_lst = c_tn_root.ensure_child("p:childTnLst", &[]);

    let seq = child_tn_lst.ensure_child("p:seq", &[("concurrent", "1"), ("nextAc", "seek")]);
    let c_tn_seq = seq.ensure_child("p:cTn", &[("dur", "indefinite"), ("nodeType", "mainSeq")]);
    if c_tn_seq.attr("id").is_none() {
        let id = ids.next().to_string();
        c_tn_seq.set_attr("id", &id);
    }
    let seq_id = c_tn_seq.attr("id").unwrap_or_default().to_string();

    let seq_children = c_tn_seq.ensure_child("p:childTnLst", &[]);
    let inner_par = seq_children.ensure_child("p:par", &[]);
    let c_tn_inner = inner_par.ensure_child("p:cTn", &[("fill", "hold")]);
    if c_tn_inner.attr("id").is_none() {
        let id = ids.next().to_string();
        c_tn_inner.set_attr("id", &id);
    }

    let st_cond_lst = c_tn_inner.ensure_child("p:stCondLst", &[]);
    st_cond_lst.ensure_child("p:cond", &[("delay", "indefinite")]);
    let cond_on_begin = st_cond_lst.ensure_child("p:cond", &[("evt", "onBegin"), ("delay", "0")]);
    cond_on_begin.ensure_child("p:tn", &[("val", &seq_id)]);

    c_tn_inner.ensure_child("p:childTnLst", &[]);

    let prev_cond_lst = seq.ensure_child("p:prevCondLst", &[]);
    let cond_prev = prev_cond_lst.ensure_child("p:cond", &[("evt", "onPrev"), ("delay", "0")]);
    cond_prev
        .ensure_child("p:tgtEl", &[])
        .ensure_child("p:sldTgt", &[]);

    let next_cond_lst = seq.ensure_child("p:nextCondLst", &[]);
    let cond_next = next_cond_lst.ensure_child("p:cond", &[("evt", "onNext"), ("delay", "0")]);
    cond_next
        .ensure_child("p:tgtEl", &[])
        .ensure_child("p:sldTgt", &[]);
}

/// The `p:childTnLst` that receives `p:audio` media nodes.
fn audio_parent_mut(slide_root: &mut XmlElement) -> &mut XmlElement {
    slide_root
        .ensure_child("p:timing", &[])
        .ensure_child("p:tnLst", &[])
        .ensure_child("p:par", &[])
        .ensure_child(
            "p:cTn",
            &[("dur", "indefinite"), ("restart", "never"), ("nodeType", "tmRoot")],
        )
        .ensure_child("p:childTnLst", &[])
}

/// The `p:childTnLst` that receives autoplay command nodes, mutable.
fn command_parent_mut(slide_root: &mut XmlElement) -> &mut XmlElement {
    audio_parent_mut(slide_root)
        .ensure_child("p:seq", &[("concurrent", "1"), ("nextAc", "seek")])
        .ensure_child("p:cTn", &[("dur", "indefinite"), ("nodeType", "mainSeq")])
        .ensure_child("p:childTnLst", &[])
        .ensure_child("p:par", &[])
        .ensure_child("p:cTn", &[("fill", "hold")])
        .ensure_child("p:childTnLst", &[])
}

/// The command parent for reading; the scaffold must already exist.
fn command_parent(slide_root: &XmlElement) -> &XmlElement {
    slide_root
        .child("p:timing")
        .and_then(|el| el.child("p:tnLst"))
        .and_then(|el| el.child("p:par"))
        .and_then(|el| el.child("p:cTn"))
        .and_then(|el| el.child("p:childTnLst"))
        .and_then(|el| el.child("p:seq"))
        .and_then(|el| el.child("p:cTn"))
        .and_then(|el| el.child("p:childTnLst"))
        .and_then(|el| el.child("p:par"))
        .and_then(|el| el.child("p:cTn"))
        .and_then(|el| el.child("p:childTnLst"))
        // ensure_timing_scaffold ran just before this
        .unwrap()
}

/// Delay for the next autoplay command: one past the highest numeric delay
/// among existing commands in the parent.
fn compute_next_delay(command_parent: &XmlElement) -> u32 {
    let mut max_delay: i64 = -1;
    command_parent.walk(&mut |el| {
        if !el.is_named("p:par") {
            return;
        }
        let Some(st_cond_lst) = el.child("p:cTn").and_then(|c| c.child("p:stCondLst")) else {
            return;
        };
        for cond in st_cond_lst.child_elements() {
            if cond.is_named("p:cond")
                && let Some(delay) = cond.attr("delay").and_then(|v| v.parse::<i64>().ok())
            {
                max_delay = max_delay.max(delay);
            }
        }
    });
    (max_delay + 1) as u32
}

/// Build a `p:par` autoplay command node invoking `playFrom(0.0)` on the
/// target shape.
fn build_command_node(spid: u32, delay: u32, ids: &mut IdAllocator) -> XmlElement {
    let mut par = XmlElement::new("p:par");
    let mut c_tn_outer = XmlElement::with_attrs(
        "p:cTn",
        &[("id", &ids.next().to_string()), ("fill", "hold")],
    );

    let mut st_cond_lst = XmlElement::new("p:stCondLst");
    st_cond_lst.push(XmlElement::with_attrs("p:cond", &[("delay", &delay.to_string())]));
    c_tn_outer.push(st_cond_lst);

    let mut child_tn_lst = XmlElement::new("p:childTnLst");
    let mut inner_par = XmlElement::new("p:par");
    let mut c_tn_inner = XmlElement::with_attrs(
        "p:cTn",
        &[
            ("id", &ids.next().to_string()),
            ("presetID", "1"),
            ("presetClass", "mediacall"),
            ("presetSubtype", "0"),
            ("fill", "hold"),
            ("nodeType", "afterEffect"),
        ],
    );

    let mut st_cond_inner = XmlElement::new("p:stCondLst");
    st_cond_inner.push(XmlElement::with_attrs("p:cond", &[("delay", "0")]));
    c_tn_inner.push(st_cond_inner);

    let mut child_inner = XmlElement::new("p:childTnLst");
    let mut cmd = XmlElement::with_attrs("p:cmd", &[("type", "call"), ("cmd", "playFrom(0.0)")]);

    let mut c_bhvr = XmlElement::new("p:cBhvr");
    c_bhvr.push(XmlElement::with_attrs(
        "p:cTn",
        &[("id", &ids.next().to_string()), ("dur", "1"), ("fill", "hold")],
    ));
    let mut tgt_el = XmlElement::new("p:tgtEl");
    tgt_el.push(XmlElement::with_attrs("p:spTgt", &[("spid", &spid.to_string())]));
    c_bhvr.push(tgt_el);
    cmd.push(c_bhvr);

    child_inner.push(cmd);
    c_tn_inner.push(child_inner);
    inner_par.push(c_tn_inner);
    child_tn_lst.push(inner_par);
    c_tn_outer.push(child_tn_lst);
    par.push(c_tn_outer);

    par
}

/// Build the `p:audio` media node for the attached clip.
fn build_audio_node(spid: u32, timing_id: u32) -> XmlElement {
    let mut audio = XmlElement::new("p:audio");
    let mut c_media_node = XmlElement::with_attrs(
        "p:cMediaNode",
        &[("vol", &DEFAULT_VOLUME.to_string()), ("showWhenStopped", "0")],
    );

    let mut c_tn = XmlElement::with_attrs(
        "p:cTn",
        &[("id", &timing_id.to_string()), ("fill", "hold"), ("display", "0")],
    );

    let mut st_cond_lst = XmlElement::new("p:stCondLst");
    st_cond_lst.push(XmlElement::with_attrs("p:cond", &[("delay", "indefinite")]));
    c_tn.push(st_cond_lst);

    let mut end_cond_lst = XmlElement::new("p:endCondLst");
    let mut cond = XmlElement::with_attrs("p:cond", &[("evt", "onStopAudio"), ("delay", "0")]);
    cond.ensure_child("p:tgtEl", &[]).ensure_child("p:sldTgt", &[]);
    end_cond_lst.push(cond);
    c_tn.push(end_cond_lst);

    c_media_node.push(c_tn);

    let mut tgt_el = XmlElement::new("p:tgtEl");
    tgt_el.push(XmlElement::with_attrs("p:spTgt", &[("spid", &spid.to_string())]));
    c_media_node.push(tgt_el);

    audio.push(c_media_node);
    audio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_for_mime() {
        assert_eq!(ext_for_mime("audio/mpeg"), "mp3");
        assert_eq!(ext_for_mime("audio/mp4"), "m4a");
        assert_eq!(ext_for_mime("audio/wav"), "wav");
        assert_eq!(ext_for_mime("application/octet-stream"), "mp3");
    }

    #[test]
    fn test_timing_scaffold_synthesizes_missing_ancestors() {
        let mut root = XmlElement::parse(br#"<p:sld xmlns:p="urn:p"><p:cSld><p:spTree/></p:cSld></p:sld>"#).unwrap();
        let mut ids = IdAllocator::starting_after(max_ctn_id(&root));

        ensure_timing_scaffold(&mut root, &mut ids);

        let parent = command_parent(&root);
        assert_eq!(parent.child_elements().count(), 0);

        // Root timing node got id 1, main sequence id 2, inner par id 3
        let timing = root.child("p:timing").unwrap();
        let c_tn = timing
            .child("p:tnLst")
            .unwrap()
            .child("p:par")
            .unwrap()
            .child("p:cTn")
            .unwrap();
        assert_eq!(c_tn.attr("id"), Some("1"));
        assert_eq!(c_tn.attr("nodeType"), Some("tmRoot"));
    }

    #[test]
    fn test_timing_scaffold_reuses_existing_ancestors() {
        let xml = br#"<p:sld xmlns:p="urn:p"><p:timing><p:tnLst><p:par><p:cTn id="7" dur="indefinite" restart="never" nodeType="tmRoot"><p:childTnLst/></p:cTn></p:par></p:tnLst></p:timing></p:sld>"#;
        let mut root = XmlElement::parse(xml).unwrap();
        let mut ids = IdAllocator::starting_after(max_ctn_id(&root));

        ensure_timing_scaffold(&mut root, &mut ids);

        let tn_lst = root.child("p:timing").unwrap().child("p:tnLst").unwrap();
        // The existing par/cTn chain was reused, not duplicated
        assert_eq!(tn_lst.child_elements().count(), 1);
        let c_tn = tn_lst.child("p:par").unwrap().child("p:cTn").unwrap();
        assert_eq!(c_tn.attr("id"), Some("7"));
        // New ids continue above the existing maximum
        assert_eq!(ids.next, 10);
    }

    #[test]
    fn test_compute_next_delay() {
        let xml = br#"<p:childTnLst xmlns:p="urn:p"><p:par><p:cTn id="9" fill="hold"><p:stCondLst><p:cond delay="2"/></p:stCondLst></p:cTn></p:par><p:par><p:cTn id="4"><p:stCondLst><p:cond delay="indefinite"/><p:cond delay="0"/></p:stCondLst></p:cTn></p:par></p:childTnLst>"#;
        let parent = XmlElement::parse(xml).unwrap();
        assert_eq!(compute_next_delay(&parent), 3);

        let empty = XmlElement::new("p:childTnLst");
        assert_eq!(compute_next_delay(&empty), 0);
    }

    #[test]
    fn test_build_command_node_targets_shape() {
        let mut ids = IdAllocator::starting_after(10);
        let node = build_command_node(5, 2, &mut ids);
        let out = node.to_fragment_string();
        assert!(out.contains(r#"<p:spTgt spid="5"/>"#));
        assert!(out.contains(r#"cmd="playFrom(0.0)""#));
        assert!(out.contains(r#"<p:cond delay="2"/>"#));
        assert!(out.contains(r#"id="11""#));
        assert_eq!(ids.next, 14);
    }

    #[test]
    fn test_build_audio_node() {
        let node = build_audio_node(5, 12);
        let out = node.to_fragment_string();
        assert!(out.contains(r#"<p:cMediaNode vol="80000" showWhenStopped="0">"#));
        assert!(out.contains(r#"<p:cond evt="onStopAudio" delay="0">"#));
        assert!(out.contains(r#"<p:spTgt spid="5"/>"#));
    }

    #[test]
    fn test_narration_icon_is_a_png() {
        assert_eq!(&NARRATION_ICON[..8], b"\x89PNG\r\n\x1a\n");
    }
}
