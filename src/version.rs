//! File version handling.
//!
//! A NIF file identifies itself through a human-readable version line
//! followed (in newer versions) by a packed binary copy of the same
//! number. The full version of a file is the quadruple of file version,
//! user version, stream version, and NDS version; the latter three
//! refine the base format for specific engine forks.

/// A file version packed as `(A << 24) | (B << 16) | (C << 8) | D`.
///
/// Comparison of two file versions is plain numeric comparison of the
/// packed value.
pub type NiFileVersion = u32;

/// Packs the four dotted components of a version into a [`NiFileVersion`].
pub const fn to_file(a: u8, b: u8, c: u8, d: u8) -> NiFileVersion {
    ((a as u32) << 24) | ((b as u32) << 16) | ((c as u32) << 8) | (d as u32)
}

pub const V2_3: NiFileVersion = to_file(2, 3, 0, 0);
pub const V3_1: NiFileVersion = to_file(3, 1, 0, 0);
pub const V4_0_0_2: NiFileVersion = to_file(4, 0, 0, 2);
pub const V5_0_0_1: NiFileVersion = to_file(5, 0, 0, 1);
pub const V5_0_0_6: NiFileVersion = to_file(5, 0, 0, 6);
pub const V10_0_0_0: NiFileVersion = to_file(10, 0, 0, 0);
pub const V10_0_1_8: NiFileVersion = to_file(10, 0, 1, 8);
pub const V10_1_0_106: NiFileVersion = to_file(10, 1, 0, 106);
pub const V10_2_0_0: NiFileVersion = to_file(10, 2, 0, 0);
pub const V20_0_0_3: NiFileVersion = to_file(20, 0, 0, 3);
pub const V20_0_0_4: NiFileVersion = to_file(20, 0, 0, 4);
pub const V20_0_0_5: NiFileVersion = to_file(20, 0, 0, 5);
pub const V20_1_0_1: NiFileVersion = to_file(20, 1, 0, 1);
pub const V20_1_0_3: NiFileVersion = to_file(20, 1, 0, 3);
pub const V20_2_0_5: NiFileVersion = to_file(20, 2, 0, 5);
pub const V20_2_0_7: NiFileVersion = to_file(20, 2, 0, 7);
pub const V20_6_0_0: NiFileVersion = to_file(20, 6, 0, 0);
pub const V30_0_0_2: NiFileVersion = to_file(30, 0, 0, 2);
pub const V30_2_0_0: NiFileVersion = to_file(30, 2, 0, 0);

/// Oldest file version the reader accepts.
pub const MIN_SUPPORTED: NiFileVersion = V2_3;
/// Newest file version the reader accepts.
pub const MAX_SUPPORTED: NiFileVersion = V30_2_0_0;

/// Whether `file` lies inside the accepted version range.
pub fn is_supported(file: NiFileVersion) -> bool {
    (MIN_SUPPORTED..=MAX_SUPPORTED).contains(&file)
}

const NIF_GAMEBRYO: &str = "Gamebryo File Format";
const NIF_NETIMMERSE: &str = "NetImmerse File Format";
const NIF_NDS: &str = "NDSNIF....@....@....";
const NIF_VERSTRING: &str = ", Version ";

/// The version quadruple carried by a header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NiVersion {
    file: NiFileVersion,
    user: u32,
    stream: u32,
    nds: u32,
}

impl NiVersion {
    /// Creates a version from its file, user, and stream components.
    pub fn new(file: NiFileVersion, user: u32, stream: u32) -> Self {
        Self {
            file,
            user,
            stream,
            nds: 0,
        }
    }

    pub fn file(&self) -> NiFileVersion {
        self.file
    }

    pub fn user(&self) -> u32 {
        self.user
    }

    pub fn stream(&self) -> u32 {
        self.stream
    }

    pub fn nds(&self) -> u32 {
        self.nds
    }

    pub fn set_file(&mut self, file: NiFileVersion) {
        self.file = file;
    }

    pub fn set_user(&mut self, user: u32) {
        self.user = user;
    }

    pub fn set_stream(&mut self, stream: u32) {
        self.stream = stream;
    }

    pub fn set_nds(&mut self, nds: u32) {
        self.nds = nds;
    }

    /// Renders the version line stored at the top of a file, without
    /// the terminating newline.
    ///
    /// Versions up to 3.1 render as `A.B`, everything newer as
    /// `A.B.C.D`. The family prefix is `NDSNIF....@....@....` when an
    /// NDS version is set, `NetImmerse File Format` below 10.0.0.0,
    /// and `Gamebryo File Format` otherwise.
    pub fn string(&self) -> String {
        let [a, b, c, d] = self.file.to_be_bytes();

        let num = if self.file > V3_1 {
            format!("{a}.{b}.{c}.{d}")
        } else {
            format!("{a}.{b}")
        };

        let family = if self.nds != 0 {
            NIF_NDS
        } else if self.file < V10_0_0_0 {
            NIF_NETIMMERSE
        } else {
            NIF_GAMEBRYO
        };

        format!("{family}{NIF_VERSTRING}{num}")
    }

    /// Renders a human-readable multi-line summary of the version.
    pub fn info(&self) -> String {
        format!(
            "{}\nUser Version: {}\nStream Version: {}",
            self.string(),
            self.user,
            self.stream
        )
    }

    /// Oblivion-era Bethesda files.
    pub fn is_oblivion(&self) -> bool {
        ((self.file == V10_1_0_106 || self.file == V10_2_0_0)
            && self.user >= 3
            && self.user <= 11)
            || (self.file == V20_0_0_4 && (self.user == 10 || self.user == 11))
            || (self.file == V20_0_0_5 && self.user == 11)
    }

    /// Fallout 3 / New Vegas files.
    pub fn is_fallout3(&self) -> bool {
        self.file == V20_2_0_7 && self.stream > 11 && self.stream < 83
    }

    /// Skyrim (2011) files.
    pub fn is_skyrim(&self) -> bool {
        self.file == V20_2_0_7 && self.stream == 83
    }

    /// Skyrim Special Edition files.
    pub fn is_skyrim_se(&self) -> bool {
        self.file == V20_2_0_7 && self.stream == 100
    }

    /// Fallout 4 files.
    pub fn is_fallout4(&self) -> bool {
        self.file == V20_2_0_7 && self.stream == 130
    }

    /// Fallout 76 files.
    pub fn is_fallout76(&self) -> bool {
        self.file == V20_2_0_7 && self.stream == 155
    }

    /// Whether the (file, user, stream) tuple belongs to a Bethesda
    /// title. Bethesda files carry extra header fields (stream
    /// version, creator, and export strings).
    pub fn is_bethesda(&self) -> bool {
        (self.file == V20_2_0_7 && self.user >= 11) || self.is_oblivion()
    }

    // Header layout predicates. Reading and writing share these so
    // the two paths cannot drift apart on which fields exist.

    /// A packed binary copy of the file version follows the version
    /// line (everything after 3.1, except NDS files).
    pub fn has_binary_version(&self) -> bool {
        self.file > V3_1 && self.nds == 0
    }

    /// The header carries an endianness flag.
    pub fn has_endian_flag(&self) -> bool {
        self.file >= V20_0_0_3
    }

    /// The header carries the user version.
    pub fn has_user_version(&self) -> bool {
        self.file >= V10_0_1_8
    }

    /// Non-Bethesda headers carry an embedded data blob.
    pub fn has_embed_data(&self) -> bool {
        self.file >= V30_0_0_2
    }

    /// Block types live in a header table indexed per block; older
    /// files name each block inline instead.
    pub fn has_block_type_table(&self) -> bool {
        self.file >= V5_0_0_1
    }

    /// The header carries per-block payload sizes.
    pub fn has_block_sizes(&self) -> bool {
        self.file >= V20_2_0_5
    }

    /// The header carries the central string pool.
    pub fn has_string_pool(&self) -> bool {
        self.file >= V20_1_0_1
    }

    /// Block-level strings serialize as pool indices instead of
    /// inline bytes.
    pub fn has_pooled_string_refs(&self) -> bool {
        self.file >= V20_1_0_3
    }

    /// The header carries the group size table.
    pub fn has_group_table(&self) -> bool {
        self.file >= V5_0_0_6
    }
}

/// Outcome of parsing the version line at the top of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionLine {
    /// The line carried the NDS marker.
    pub nds: bool,
    /// The file version extracted from the dotted suffix; 0 when the
    /// line carries no `, Version ` marker.
    pub file: NiFileVersion,
}

/// Matches `line` against the three known family prefixes and extracts
/// the dotted version number.
///
/// Returns [`None`] when the line belongs to none of the families, in
/// which case the file is not a NIF.
pub fn parse_version_line(line: &str) -> Option<VersionLine> {
    let is_netimmerse = line.contains(NIF_NETIMMERSE);
    let is_gamebryo = line.contains(NIF_GAMEBRYO);
    let is_nds = line.contains(NIF_NDS);

    if !is_netimmerse && !is_gamebryo && !is_nds {
        return None;
    }

    let file = match line.find(NIF_VERSTRING) {
        Some(at) => {
            let [a, b, c, d] = scan_version_numbers(&line[at + NIF_VERSTRING.len()..]);
            to_file(a, b, c, d)
        }
        None => 0,
    };

    Some(VersionLine { nds: is_nds, file })
}

/// Extracts up to four decimal numbers in 0..=255 from `s`, scanning
/// left to right. Each number is the longest run of up to three digits
/// that stays in range; multi-digit numbers never start with a zero.
/// Missing components are zero.
fn scan_version_numbers(s: &str) -> [u8; 4] {
    let bytes = s.as_bytes();
    let mut out = [0u8; 4];
    let mut found = 0;
    let mut i = 0;

    while i < bytes.len() && found < 4 {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let mut len = 1;
        while len < 3 && i + len < bytes.len() && bytes[i + len].is_ascii_digit() {
            len += 1;
        }

        loop {
            let token = &s[i..i + len];
            let value: u32 = token.parse().unwrap_or(u32::MAX);
            if value <= 255 && (len == 1 || !token.starts_with('0')) {
                out[found] = value as u8;
                found += 1;
                i += len;
                break;
            }
            len -= 1;
        }
    }

    out
}
