//! Binary PLY header decoding and sequential vertex record reading.

use crate::error::SplatError;
use foldhash::HashMap;
use foldhash::HashMapExt;
use zerocopy::byteorder::{LittleEndian, F32, F64, I16, I32, I64, U16, U32, U64};
use zerocopy::FromBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "char" | "int8" => Some(Self::I8),
            "uchar" | "uint8" => Some(Self::U8),
            "short" | "int16" => Some(Self::I16),
            "ushort" | "uint16" => Some(Self::U16),
            "int" | "int32" => Some(Self::I32),
            "uint" | "uint32" => Some(Self::U32),
            "long" | "int64" => Some(Self::I64),
            "ulong" | "uint64" => Some(Self::U64),
            "float" | "float32" => Some(Self::F32),
            "double" | "float64" => Some(Self::F64),
            _ => None,
        }
    }

    pub const fn size_bytes(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Decodes one little-endian value. `bytes` must be exactly `size_bytes()` long.
    fn decode(self, bytes: &[u8]) -> Option<f64> {
        let v = match self {
            Self::I8 => *bytes.first()? as i8 as f64,
            Self::U8 => *bytes.first()? as f64,
            Self::I16 => I16::<LittleEndian>::read_from_bytes(bytes).ok()?.get() as f64,
            Self::U16 => U16::<LittleEndian>::read_from_bytes(bytes).ok()?.get() as f64,
            Self::I32 => I32::<LittleEndian>::read_from_bytes(bytes).ok()?.get() as f64,
            Self::U32 => U32::<LittleEndian>::read_from_bytes(bytes).ok()?.get() as f64,
            Self::I64 => I64::<LittleEndian>::read_from_bytes(bytes).ok()?.get() as f64,
            Self::U64 => U64::<LittleEndian>::read_from_bytes(bytes).ok()?.get() as f64,
            Self::F32 => F32::<LittleEndian>::read_from_bytes(bytes).ok()?.get() as f64,
            Self::F64 => F64::<LittleEndian>::read_from_bytes(bytes).ok()?.get(),
        };
        Some(v)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub ty: ScalarType,
    /// Byte offset inside a vertex record.
    pub offset: usize,
}

/// Ordered property name to scalar type mapping of the vertex element.
#[derive(Debug, Clone, Default)]
pub struct PropertyTypeMap {
    properties: Vec<PropertyDef>,
    index: HashMap<String, usize>,
    stride: usize,
}

impl PropertyTypeMap {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            index: HashMap::new(),
            stride: 0,
        }
    }

    /// Appends a property. Duplicate names are rejected.
    pub fn push(&mut self, name: &str, ty: ScalarType) -> Result<(), SplatError> {
        if self.index.contains_key(name) {
            return Err(SplatError::MalformedHeader(format!(
                "Duplicate property: {}",
                name
            )));
        }
        self.index.insert(name.to_string(), self.properties.len());
        self.properties.push(PropertyDef {
            name: name.to_string(),
            ty,
            offset: self.stride,
        });
        self.stride += ty.size_bytes();
        Ok(())
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<ScalarType> {
        self.index_of(name).map(|i| self.properties[i].ty)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Sum of all declared property widths: the size of one vertex record.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Output of [`decode_header`]: the vertex count, the property layout and the
/// byte region starting at the first vertex record.
#[derive(Debug, Clone)]
pub struct DecodedPly<'a> {
    pub vertex_count: usize,
    pub property_types: PropertyTypeMap,
    pub vertex_data: &'a [u8],
}

/// Decoded scalar values of one vertex record, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RawVertex {
    values: Vec<f64>,
}

impl RawVertex {
    pub fn for_types(types: &PropertyTypeMap) -> Self {
        Self {
            values: Vec::with_capacity(types.len()),
        }
    }

    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn get(&self, types: &PropertyTypeMap, name: &str) -> Option<f64> {
        types
            .index_of(name)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[inline]
fn next_line<'b>(buffer: &'b [u8], offset: &mut usize) -> Option<&'b [u8]> {
    if *offset >= buffer.len() {
        return None;
    }
    let start = *offset;

    let line = match memchr::memchr(b'\n', &buffer[*offset..]) {
        Some(pos) => {
            *offset = start + pos + 1;
            &buffer[start..start + pos]
        }
        None => {
            *offset = buffer.len();
            &buffer[start..]
        }
    };
    Some(line.strip_suffix(b"\r").unwrap_or(line))
}

fn header_str(line: &[u8]) -> Result<&str, SplatError> {
    std::str::from_utf8(line)
        .map(str::trim)
        .map_err(|e| SplatError::MalformedHeader(format!("UTF-8 error: {}", e)))
}

/// Parses the PLY header and returns the vertex element layout together with
/// the record region that follows `end_header`.
pub fn decode_header(raw_data: &[u8]) -> Result<DecodedPly<'_>, SplatError> {
    let mut offset = 0;

    let magic = next_line(raw_data, &mut offset)
        .ok_or_else(|| SplatError::MalformedHeader("No 'ply' line".to_string()))?;
    if magic != b"ply" {
        return Err(SplatError::MalformedHeader(
            "Not a .ply file (missing 'ply' header)".to_string(),
        ));
    }

    let mut format_seen = false;
    let mut vertex_count: Option<usize> = None;
    // true while the properties being declared belong to the vertex element
    let mut in_vertex = false;
    let mut property_types = PropertyTypeMap::new();

    loop {
        let line = next_line(raw_data, &mut offset).ok_or_else(|| {
            SplatError::MalformedHeader("No 'end_header' found before EOF".to_string())
        })?;
        let line = header_str(line)?;
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some("end_header") => break,
            None | Some("comment") | Some("obj_info") => {}
            Some("format") => {
                if tokens.next() != Some("binary_little_endian") || tokens.next() != Some("1.0")
                {
                    return Err(SplatError::MalformedHeader(
                        "Unsupported .ply format (only binary_little_endian 1.0 is supported)"
                            .to_string(),
                    ));
                }
                format_seen = true;
            }
            Some("element") => {
                let name = tokens.next().ok_or_else(|| {
                    SplatError::MalformedHeader(format!("Bad element line: {}", line))
                })?;
                let count = tokens
                    .next()
                    .ok_or_else(|| {
                        SplatError::MalformedHeader(format!("Missing element count: {}", line))
                    })?
                    .parse::<usize>()
                    .map_err(|e| SplatError::MalformedHeader(format!("Parse error: {}", e)))?;

                if name == "vertex" {
                    if vertex_count.is_some() {
                        return Err(SplatError::MalformedHeader(
                            "Duplicate 'element vertex' definition".to_string(),
                        ));
                    }
                    vertex_count = Some(count);
                    in_vertex = true;
                } else if vertex_count.is_none() {
                    // Its data would precede the vertex records.
                    return Err(SplatError::MalformedHeader(format!(
                        "Element '{}' declared before 'vertex'",
                        name
                    )));
                } else {
                    in_vertex = false;
                }
            }
            Some("property") => {
                if vertex_count.is_none() {
                    return Err(SplatError::MalformedHeader(
                        "Property declared outside of an element".to_string(),
                    ));
                }
                let ty_name = tokens.next().ok_or_else(|| {
                    SplatError::MalformedHeader(format!("Bad property line: {}", line))
                })?;
                if ty_name == "list" {
                    if in_vertex {
                        return Err(SplatError::MalformedHeader(format!(
                            "List properties are not supported: {}",
                            line
                        )));
                    }
                    continue;
                }
                if !in_vertex {
                    continue;
                }
                let ty = ScalarType::parse(ty_name).ok_or_else(|| {
                    SplatError::MalformedHeader(format!("Unknown property type: {}", ty_name))
                })?;
                let name = tokens.next().ok_or_else(|| {
                    SplatError::MalformedHeader(format!("Missing property name: {}", line))
                })?;
                property_types.push(name, ty)?;
            }
            Some(other) => {
                return Err(SplatError::MalformedHeader(format!(
                    "Unsupported header line: {}",
                    other
                )));
            }
        }
    }

    if !format_seen {
        return Err(SplatError::MalformedHeader(
            "Missing format line".to_string(),
        ));
    }
    let vertex_count = vertex_count.ok_or_else(|| {
        SplatError::MalformedHeader("Missing 'element vertex' definition".to_string())
    })?;

    Ok(DecodedPly {
        vertex_count,
        property_types,
        vertex_data: &raw_data[offset..],
    })
}

/// Reads the record starting at `offset` into `out` and returns the offset of
/// the next record.
pub fn read_raw_vertex(
    offset: usize,
    data: &[u8],
    types: &PropertyTypeMap,
    out: &mut RawVertex,
) -> Result<usize, SplatError> {
    let end = offset
        .checked_add(types.stride())
        .ok_or_else(|| SplatError::MalformedRecord("Overflow in record offset".to_string()))?;
    let record = data.get(offset..end).ok_or_else(|| {
        SplatError::MalformedRecord(format!(
            "Unexpected end of binary data: record at byte {} needs {} bytes, have {}",
            offset,
            types.stride(),
            data.len().saturating_sub(offset)
        ))
    })?;

    out.values.clear();
    for prop in types.properties() {
        let bytes = &record[prop.offset..prop.offset + prop.ty.size_bytes()];
        let value = prop.ty.decode(bytes).ok_or_else(|| {
            SplatError::MalformedRecord(format!(
                "Byte conversion error for {} at byte {}",
                prop.name,
                offset + prop.offset
            ))
        })?;
        out.values.push(value);
    }
    Ok(end)
}
