//! Attribute dictionary: tag key to (name, VR).
//!
//! The table is a static slice indexed once on first use. Lookups never fail
//! loudly: an absent entry is expected, and the decoder falls back to the
//! hex label of the key with an `UN` representation.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::tags::{Tag, Vr};

/// One dictionary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub tag: Tag,
    pub name: &'static str,
    pub vr: Vr,
}

const fn entry(group: u16, element: u16, name: &'static str, vr: Vr) -> DictionaryEntry {
    DictionaryEntry {
        tag: Tag::new(group, element),
        name,
        vr,
    }
}

/// Groups whose low byte repeats (overlay and curve groups `60xx`, `50xx`).
/// Entries for them are stored with the low byte of the group cleared.
const REPEATING_GROUPS: [u16; 2] = [0x6000, 0x5000];

#[rustfmt::skip]
static ENTRIES: &[DictionaryEntry] = &[
    // File meta
    entry(0x0002, 0x0000, "File Meta Information Group Length", Vr::UL),
    entry(0x0002, 0x0001, "File Meta Information Version", Vr::OB),
    entry(0x0002, 0x0002, "Media Storage SOP Class UID", Vr::UI),
    entry(0x0002, 0x0003, "Media Storage SOP Instance UID", Vr::UI),
    entry(0x0002, 0x0010, "Transfer Syntax UID", Vr::UI),
    entry(0x0002, 0x0012, "Implementation Class UID", Vr::UI),
    entry(0x0002, 0x0013, "Implementation Version Name", Vr::SH),
    entry(0x0002, 0x0016, "Source Application Entity Title", Vr::AE),
    // SOP common and identification
    entry(0x0008, 0x0005, "Specific Character Set", Vr::CS),
    entry(0x0008, 0x0008, "Image Type", Vr::CS),
    entry(0x0008, 0x0012, "Instance Creation Date", Vr::DA),
    entry(0x0008, 0x0013, "Instance Creation Time", Vr::TM),
    entry(0x0008, 0x0016, "SOP Class UID", Vr::UI),
    entry(0x0008, 0x0018, "SOP Instance UID", Vr::UI),
    entry(0x0008, 0x0020, "Study Date", Vr::DA),
    entry(0x0008, 0x0021, "Series Date", Vr::DA),
    entry(0x0008, 0x0022, "Acquisition Date", Vr::DA),
    entry(0x0008, 0x0023, "Content Date", Vr::DA),
    entry(0x0008, 0x002A, "Acquisition DateTime", Vr::DT),
    entry(0x0008, 0x0030, "Study Time", Vr::TM),
    entry(0x0008, 0x0031, "Series Time", Vr::TM),
    entry(0x0008, 0x0032, "Acquisition Time", Vr::TM),
    entry(0x0008, 0x0033, "Content Time", Vr::TM),
    entry(0x0008, 0x0050, "Accession Number", Vr::SH),
    entry(0x0008, 0x0060, "Modality", Vr::CS),
    entry(0x0008, 0x0064, "Conversion Type", Vr::CS),
    entry(0x0008, 0x0070, "Manufacturer", Vr::LO),
    entry(0x0008, 0x0080, "Institution Name", Vr::LO),
    entry(0x0008, 0x0090, "Referring Physician's Name", Vr::PN),
    entry(0x0008, 0x1010, "Station Name", Vr::SH),
    entry(0x0008, 0x1030, "Study Description", Vr::LO),
    entry(0x0008, 0x103E, "Series Description", Vr::LO),
    entry(0x0008, 0x1090, "Manufacturer's Model Name", Vr::LO),
    entry(0x0008, 0x1140, "Referenced Image Sequence", Vr::SQ),
    entry(0x0008, 0x1150, "Referenced SOP Class UID", Vr::UI),
    entry(0x0008, 0x1155, "Referenced SOP Instance UID", Vr::UI),
    // Patient
    entry(0x0010, 0x0010, "Patient's Name", Vr::PN),
    entry(0x0010, 0x0020, "Patient ID", Vr::LO),
    entry(0x0010, 0x0030, "Patient's Birth Date", Vr::DA),
    entry(0x0010, 0x0040, "Patient's Sex", Vr::CS),
    entry(0x0010, 0x1010, "Patient's Age", Vr::AS),
    entry(0x0010, 0x1020, "Patient's Size", Vr::DS),
    entry(0x0010, 0x1030, "Patient's Weight", Vr::DS),
    // Acquisition
    entry(0x0018, 0x0015, "Body Part Examined", Vr::CS),
    entry(0x0018, 0x0050, "Slice Thickness", Vr::DS),
    entry(0x0018, 0x0060, "KVP", Vr::DS),
    entry(0x0018, 0x0088, "Spacing Between Slices", Vr::DS),
    entry(0x0018, 0x1000, "Device Serial Number", Vr::LO),
    entry(0x0018, 0x1020, "Software Versions", Vr::LO),
    entry(0x0018, 0x1030, "Protocol Name", Vr::LO),
    entry(0x0018, 0x1063, "Frame Time", Vr::DS),
    entry(0x0018, 0x1150, "Exposure Time", Vr::IS),
    entry(0x0018, 0x1151, "X-Ray Tube Current", Vr::IS),
    entry(0x0018, 0x1152, "Exposure", Vr::IS),
    entry(0x0018, 0x1164, "Imager Pixel Spacing", Vr::DS),
    entry(0x0018, 0x5100, "Patient Position", Vr::CS),
    // Relationship and geometry
    entry(0x0020, 0x000D, "Study Instance UID", Vr::UI),
    entry(0x0020, 0x000E, "Series Instance UID", Vr::UI),
    entry(0x0020, 0x0010, "Study ID", Vr::SH),
    entry(0x0020, 0x0011, "Series Number", Vr::IS),
    entry(0x0020, 0x0012, "Acquisition Number", Vr::IS),
    entry(0x0020, 0x0013, "Instance Number", Vr::IS),
    entry(0x0020, 0x0020, "Patient Orientation", Vr::CS),
    entry(0x0020, 0x0032, "Image Position (Patient)", Vr::DS),
    entry(0x0020, 0x0037, "Image Orientation (Patient)", Vr::DS),
    entry(0x0020, 0x0052, "Frame of Reference UID", Vr::UI),
    entry(0x0020, 0x1041, "Slice Location", Vr::DS),
    entry(0x0020, 0x4000, "Image Comments", Vr::LT),
    // Image pixel
    entry(0x0028, 0x0002, "Samples per Pixel", Vr::US),
    entry(0x0028, 0x0004, "Photometric Interpretation", Vr::CS),
    entry(0x0028, 0x0006, "Planar Configuration", Vr::US),
    entry(0x0028, 0x0008, "Number of Frames", Vr::IS),
    entry(0x0028, 0x0009, "Frame Increment Pointer", Vr::AT),
    entry(0x0028, 0x0010, "Rows", Vr::US),
    entry(0x0028, 0x0011, "Columns", Vr::US),
    entry(0x0028, 0x0030, "Pixel Spacing", Vr::DS),
    entry(0x0028, 0x0034, "Pixel Aspect Ratio", Vr::IS),
    entry(0x0028, 0x0100, "Bits Allocated", Vr::US),
    entry(0x0028, 0x0101, "Bits Stored", Vr::US),
    entry(0x0028, 0x0102, "High Bit", Vr::US),
    entry(0x0028, 0x0103, "Pixel Representation", Vr::US),
    entry(0x0028, 0x0106, "Smallest Image Pixel Value", Vr::US),
    entry(0x0028, 0x0107, "Largest Image Pixel Value", Vr::US),
    entry(0x0028, 0x0301, "Burned In Annotation", Vr::CS),
    entry(0x0028, 0x1050, "Window Center", Vr::DS),
    entry(0x0028, 0x1051, "Window Width", Vr::DS),
    entry(0x0028, 0x1052, "Rescale Intercept", Vr::DS),
    entry(0x0028, 0x1053, "Rescale Slope", Vr::DS),
    entry(0x0028, 0x1054, "Rescale Type", Vr::LO),
    entry(0x0028, 0x1055, "Window Center & Width Explanation", Vr::LO),
    entry(0x0028, 0x1101, "Red Palette Color Lookup Table Descriptor", Vr::US),
    entry(0x0028, 0x1102, "Green Palette Color Lookup Table Descriptor", Vr::US),
    entry(0x0028, 0x1103, "Blue Palette Color Lookup Table Descriptor", Vr::US),
    entry(0x0028, 0x1201, "Red Palette Color Lookup Table Data", Vr::OW),
    entry(0x0028, 0x1202, "Green Palette Color Lookup Table Data", Vr::OW),
    entry(0x0028, 0x1203, "Blue Palette Color Lookup Table Data", Vr::OW),
    entry(0x0028, 0x2110, "Lossy Image Compression", Vr::CS),
    entry(0x0028, 0x2112, "Lossy Image Compression Ratio", Vr::DS),
    entry(0x0028, 0x3010, "VOI LUT Sequence", Vr::SQ),
    // Overlays (60xx)
    entry(0x6000, 0x0010, "Overlay Rows", Vr::US),
    entry(0x6000, 0x0011, "Overlay Columns", Vr::US),
    entry(0x6000, 0x0040, "Overlay Type", Vr::CS),
    entry(0x6000, 0x0050, "Overlay Origin", Vr::SS),
    entry(0x6000, 0x0100, "Overlay Bits Allocated", Vr::US),
    entry(0x6000, 0x0102, "Overlay Bit Position", Vr::US),
    entry(0x6000, 0x3000, "Overlay Data", Vr::OW),
    // Curves (50xx)
    entry(0x5000, 0x0005, "Curve Dimensions", Vr::US),
    entry(0x5000, 0x3000, "Curve Data", Vr::OB),
    // Pixel data
    entry(0x7FE0, 0x0008, "Float Pixel Data", Vr::OF),
    entry(0x7FE0, 0x0009, "Double Float Pixel Data", Vr::OD),
    entry(0x7FE0, 0x0010, "Pixel Data", Vr::OW),
    // Items and delimiters
    entry(0xFFFE, 0xE000, "Item", Vr::UN),
    entry(0xFFFE, 0xE00D, "Item Delimitation Item", Vr::UN),
    entry(0xFFFE, 0xE0DD, "Sequence Delimitation Item", Vr::UN),
];

/// Indexed view over the static table.
#[derive(Debug)]
pub struct AttributeDictionary {
    by_tag: HashMap<Tag, &'static DictionaryEntry>,
    by_name: HashMap<&'static str, &'static DictionaryEntry>,
}

static DICTIONARY: Lazy<AttributeDictionary> = Lazy::new(|| {
    let mut dict = AttributeDictionary {
        by_tag: HashMap::with_capacity(ENTRIES.len()),
        by_name: HashMap::with_capacity(ENTRIES.len()),
    };
    for e in ENTRIES {
        dict.by_tag.insert(e.tag, e);
        dict.by_name.insert(e.name, e);
    }
    dict
});

impl AttributeDictionary {
    /// The process-wide dictionary, built on first use.
    #[inline]
    pub fn global() -> &'static AttributeDictionary {
        &DICTIONARY
    }

    /// Look up a key, folding repeating groups onto their base group.
    pub fn lookup(&self, tag: Tag) -> Option<&'static DictionaryEntry> {
        self.by_tag.get(&tag).copied().or_else(|| {
            let base = tag.group() & 0xFF00;
            if REPEATING_GROUPS.contains(&base) && tag.group() % 2 == 0 {
                return self.by_tag.get(&Tag::new(base, tag.element())).copied();
            }
            None
        })
    }

    /// Reverse lookup by attribute name.
    pub fn tag_by_name(&self, name: &str) -> Option<Tag> {
        self.by_name.get(name).map(|e| e.tag)
    }

    /// Name for a key, or its `(gggg,eeee)` label when unknown.
    pub fn name_of(&self, tag: Tag) -> String {
        match self.lookup(tag) {
            Some(e) => e.name.to_string(),
            None => tag.to_string(),
        }
    }

    /// VR for a key, or `UN` when unknown.
    pub fn vr_of(&self, tag: Tag) -> Vr {
        self.lookup(tag).map(|e| e.vr).unwrap_or(Vr::UN)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}
