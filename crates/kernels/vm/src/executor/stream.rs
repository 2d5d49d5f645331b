//! Processing streams: typed, strided views over caller-owned buffers.

use lanevm_foundation::half::{f16_bits_to_f32, f32_to_f16_bits};
use lanevm_foundation::{StreamDataType, StreamDesc, StreamElement};

/// Read-only input data for one program input.
#[derive(Debug, Clone)]
pub struct ProcessingStream<'a> {
    name: String,
    data_type: StreamDataType,
    data: &'a [u8],
    stride: usize,
}

impl<'a> ProcessingStream<'a> {
    /// Wraps a tightly packed slice. The element type of `T` only has to
    /// match `data_type` in size; half-float data is passed as `u16`.
    pub fn from_slice<T: bytemuck::Pod>(
        name: impl Into<String>,
        data_type: StreamDataType,
        values: &'a [T],
    ) -> Self {
        Self::from_bytes(name, data_type, bytemuck::cast_slice(values))
    }

    /// Wraps raw bytes with the packed stride of `data_type`.
    pub fn from_bytes(name: impl Into<String>, data_type: StreamDataType, data: &'a [u8]) -> Self {
        Self {
            name: name.into(),
            data_type,
            data,
            stride: data_type.size(),
        }
    }

    /// Sets the distance in bytes between consecutive instances.
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Skips `offset` leading bytes, e.g. to address one field of an
    /// interleaved struct buffer.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.data = self.data.get(offset..).unwrap_or_default();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> StreamDataType {
        self.data_type
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn desc(&self) -> StreamDesc {
        StreamDesc::new(self.name.clone(), self.data_type)
    }
}

/// Writable output data for one program output.
#[derive(Debug)]
pub struct ProcessingStreamMut<'a> {
    name: String,
    data_type: StreamDataType,
    data: &'a mut [u8],
    stride: usize,
}

impl<'a> ProcessingStreamMut<'a> {
    pub fn from_slice<T: bytemuck::Pod>(
        name: impl Into<String>,
        data_type: StreamDataType,
        values: &'a mut [T],
    ) -> Self {
        Self::from_bytes(name, data_type, bytemuck::cast_slice_mut(values))
    }

    pub fn from_bytes(
        name: impl Into<String>,
        data_type: StreamDataType,
        data: &'a mut [u8],
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            data,
            stride: data_type.size(),
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        let data = std::mem::take(&mut self.data);
        self.data = data.get_mut(offset..).unwrap_or_default();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> StreamDataType {
        self.data_type
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes(&self) -> &[u8] {
        &*self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    pub fn desc(&self) -> StreamDesc {
        StreamDesc::new(self.name.clone(), self.data_type)
    }
}

/// Bytes needed to address `count` instances of `element_size` at `stride`.
pub(crate) fn required_bytes(count: usize, stride: usize, offset: usize, element_size: usize) -> usize {
    match count {
        0 => 0,
        n => offset + (n - 1) * stride + element_size,
    }
}

/// Decodes one stream element into register bits.
pub(crate) fn read_element(element: StreamElement, bytes: &[u8]) -> u32 {
    match element {
        StreamElement::Float | StreamElement::Int => bytemuck::pod_read_unaligned::<u32>(bytes),
        StreamElement::Half => f16_bits_to_f32(bytemuck::pod_read_unaligned(bytes)).to_bits(),
        StreamElement::Short => bytemuck::pod_read_unaligned::<i16>(bytes) as i32 as u32,
        StreamElement::Byte => bytes[0] as i8 as i32 as u32,
    }
}

/// Encodes register bits into one stream element. Narrow integer types
/// keep the low bits.
pub(crate) fn write_element(element: StreamElement, bits: u32, bytes: &mut [u8]) {
    match element {
        StreamElement::Float | StreamElement::Int => bytes.copy_from_slice(&bits.to_ne_bytes()),
        StreamElement::Half => {
            bytes.copy_from_slice(&f32_to_f16_bits(f32::from_bits(bits)).to_ne_bytes())
        }
        StreamElement::Short => bytes.copy_from_slice(&(bits as i32 as i16).to_ne_bytes()),
        StreamElement::Byte => bytes[0] = bits as i32 as i8 as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_integers_sign_extend() {
        assert_eq!(read_element(StreamElement::Byte, &[0xFF]) as i32, -1);
        assert_eq!(read_element(StreamElement::Short, &(-300i16).to_ne_bytes()) as i32, -300);

        let mut byte = [0u8];
        write_element(StreamElement::Byte, 300i32 as u32, &mut byte);
        assert_eq!(byte[0] as i8, 44);
    }

    #[test]
    fn test_half_round_trips_through_register_bits() {
        let mut half = [0u8; 2];
        write_element(StreamElement::Half, 1.5f32.to_bits(), &mut half);
        assert_eq!(f32::from_bits(read_element(StreamElement::Half, &half)), 1.5);
    }

    #[test]
    fn test_offset_and_stride_view() {
        let packed = [1.0f32, 10.0, 2.0, 20.0];
        let stream = ProcessingStream::from_slice("b", StreamDataType::FLOAT, &packed)
            .with_offset(4)
            .with_stride(8);
        assert_eq!(stream.bytes().len(), 12);
        assert_eq!(required_bytes(2, stream.stride(), 0, 4), 12);
        assert_eq!(required_bytes(0, 8, 0, 4), 0);
    }
}
