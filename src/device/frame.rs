use crate::device::{DecodeError, Decoded, LayoutError, RawFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Float,
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub type_: FieldType,
    pub size: u8,
}

impl Field {
    fn parse(description: &str) -> Option<Field> {
        let mut chars = description.chars().map(|c| c.to_ascii_lowercase());

        let type_char = chars.next()?;
        let size_char = chars.next()?;

        let size = [1, 2, 4][['1', '2', '4'].iter().position(|&c| c == size_char)?];

        let type_ = match (type_char, size) {
            ('b', 1) => FieldType::Boolean,
            ('f', 4) => FieldType::Float,
            ('i', _) => FieldType::Signed,
            ('u', _) => FieldType::Unsigned,
            _ => return None,
        };

        Some(Field { type_, size })
    }

    fn decode(&self, bytes: &[u8]) -> Option<f64> {
        use FieldType::*;

        debug_assert!(bytes.len() == self.size as usize);

        match (self.type_, self.size) {
            (Boolean, 1) => Some(if *bytes.first()? != 0 { 1.0 } else { 0.0 }),
            (Float, 4) => Some(f32::from_le_bytes(bytes.try_into().ok()?) as f64),
            (Signed, 1) => Some(i8::from_le_bytes(bytes.try_into().ok()?) as f64),
            (Signed, 2) => Some(i16::from_le_bytes(bytes.try_into().ok()?) as f64),
            (Signed, 4) => Some(i32::from_le_bytes(bytes.try_into().ok()?) as f64),
            (Unsigned, 1) => Some(u8::from_le_bytes(bytes.try_into().ok()?) as f64),
            (Unsigned, 2) => Some(u16::from_le_bytes(bytes.try_into().ok()?) as f64),
            (Unsigned, 4) => Some(u32::from_le_bytes(bytes.try_into().ok()?) as f64),
            _ => None,
        }
    }

    // out-of-range values saturate
    fn encode(&self, value: f64, out: &mut Vec<u8>) {
        use FieldType::*;

        match (self.type_, self.size) {
            (Boolean, _) => out.push((value != 0.0) as u8),
            (Float, _) => out.extend_from_slice(&(value as f32).to_le_bytes()),
            (Signed, 1) => out.extend_from_slice(&(value.round() as i8).to_le_bytes()),
            (Signed, 2) => out.extend_from_slice(&(value.round() as i16).to_le_bytes()),
            (Signed, _) => out.extend_from_slice(&(value.round() as i32).to_le_bytes()),
            (Unsigned, 1) => out.extend_from_slice(&(value.round() as u8).to_le_bytes()),
            (Unsigned, 2) => out.extend_from_slice(&(value.round() as u16).to_le_bytes()),
            (Unsigned, _) => out.extend_from_slice(&(value.round() as u32).to_le_bytes()),
        }
    }
}

/// Binary layout of a fixed-size, little-endian sensor frame.
///
/// Layouts are written as compact descriptors like `"T4I2I2I2"`: an optional
/// leading `T4` for a u32 device timestamp (microseconds), then one
/// two-character field per channel: `B1`, `F4`, `I1`/`I2`/`I4` or
/// `U1`/`U2`/`U4`. Each channel is multiplied by its scale factor when
/// decoded, which turns raw counts into engineering units.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    has_u32_us_time: bool,
    fields: Vec<Field>,
    scales: Vec<f64>,
}

impl FrameLayout {
    pub fn parse(descriptor: &str) -> Result<FrameLayout, LayoutError> {
        let format_string = descriptor.trim().to_ascii_lowercase();

        let (has_u32_us_time, mut to_parse) = match format_string.strip_prefix("t4") {
            Some(stripped) => (true, stripped),
            None => (false, format_string.as_str()),
        };

        let mut fields = Vec::new();

        while !to_parse.is_empty() {
            let split = to_parse
                .char_indices()
                .nth(2)
                .map(|(i, _)| i)
                .unwrap_or(to_parse.len());
            let (description, rest) = to_parse.split_at(split);

            let field = Field::parse(description)
                .ok_or_else(|| LayoutError::UnknownField(description.to_string()))?;
            fields.push(field);

            to_parse = rest;
        }

        if fields.is_empty() {
            return Err(LayoutError::Empty);
        }

        let scales = vec![1.0; fields.len()];

        Ok(FrameLayout {
            has_u32_us_time,
            fields,
            scales,
        })
    }

    pub fn with_scales(mut self, scales: Vec<f64>) -> FrameLayout {
        assert_eq!(
            scales.len(),
            self.fields.len(),
            "frame layout has {} channels but {} scales were given",
            self.fields.len(),
            scales.len()
        );

        self.scales = scales;
        self
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn has_device_time(&self) -> bool {
        self.has_u32_us_time
    }

    pub fn frame_size(&self) -> usize {
        let time_field_size = if self.has_u32_us_time { 4 } else { 0 };

        self.fields
            .iter()
            .map(|field| field.size as usize)
            .sum::<usize>()
            + time_field_size
    }

    pub fn decode(&self, frame: &RawFrame) -> Result<Decoded, DecodeError> {
        let expected = self.frame_size();
        if frame.len() != expected {
            return Err(DecodeError::WrongLength {
                expected,
                actual: frame.len(),
            });
        }

        let mut bytes = frame.as_bytes();

        let device_time = if self.has_u32_us_time {
            let (time_bytes, rest) = bytes.split_at(4);
            bytes = rest;
            let time_bytes: [u8; 4] = time_bytes
                .try_into()
                .map_err(|_| DecodeError::InvalidField(0))?;
            Some(u32::from_le_bytes(time_bytes) as u64)
        } else {
            None
        };

        let values = self
            .fields
            .iter()
            .zip(&self.scales)
            .enumerate()
            .map(|(i, (field, scale))| {
                let (to_decode, rest) = bytes.split_at(field.size as usize);
                bytes = rest;
                field
                    .decode(to_decode)
                    .map(|raw| raw * scale)
                    .ok_or(DecodeError::InvalidField(i))
            })
            .collect::<Result<Vec<f64>, DecodeError>>()?;

        Ok(Decoded {
            values,
            device_time,
        })
    }

    // raw (unscaled) values, one per channel
    pub fn encode(&self, device_time: Option<u32>, raw_values: &[f64]) -> RawFrame {
        assert_eq!(raw_values.len(), self.fields.len());

        let mut bytes = Vec::with_capacity(self.frame_size());

        if self.has_u32_us_time {
            bytes.extend_from_slice(&device_time.unwrap_or(0).to_le_bytes());
        }

        for (field, &value) in self.fields.iter().zip(raw_values) {
            field.encode(value, &mut bytes);
        }

        RawFrame::new(bytes)
    }
}
