//! Stream and function binding.
//!
//! Resolves every input, output and function slot of a program against what
//! the caller supplied, before any instruction runs. After binding succeeds
//! every read and write the handlers perform is in bounds.

use indexmap::IndexMap;
use lanevm_foundation::{StreamDataType, StreamDesc, StreamElement, VectorComponent};
use tracing::{trace, warn};

use super::stream::{read_element, required_bytes, write_element};
use super::{ProcessingStream, ProcessingStreamMut};
use crate::bytecode::ByteCodeProgram;
use crate::config::ExecuteFlags;
use crate::error::ExecuteError;
use crate::function::{ExpressionFunction, NativeFunction};

/// Input slot resolved to a byte range of a caller stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InputView<'a> {
    data: &'a [u8],
    stride: usize,
    pub(crate) element: StreamElement,
}

impl InputView<'_> {
    /// Register bits of instance `index`.
    pub(crate) fn read(&self, index: usize) -> u32 {
        let start = index * self.stride;
        read_element(self.element, &self.data[start..start + self.element.size()])
    }
}

/// Output slot resolved to a caller stream by index, since several slots
/// can write components of the same vector stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputSlot {
    pub(crate) stream: usize,
    offset: usize,
    stride: usize,
    element: StreamElement,
}

impl OutputSlot {
    pub(crate) fn write(&self, buffer: &mut [u8], instance: usize, bits: u32) {
        let start = self.offset + instance * self.stride;
        write_element(self.element, bits, &mut buffer[start..start + self.element.size()]);
    }
}

/// Where a program slot found its data. `split` marks a component view
/// into a vector stream.
#[derive(Debug, Clone, Copy)]
struct Located {
    stream: usize,
    component: usize,
    split: bool,
}

fn locate(
    streams: &[(&str, StreamDataType)],
    desc: &StreamDesc,
    flags: ExecuteFlags,
) -> Option<Located> {
    if let Some(stream) = streams.iter().position(|(name, _)| *name == desc.name) {
        return Some(Located {
            stream,
            component: 0,
            split: false,
        });
    }
    if !flags.scalarize_streams {
        return None;
    }

    let (base, suffix) = desc.name.rsplit_once('.')?;
    let mut chars = suffix.chars();
    let component = match (chars.next(), chars.next()) {
        (Some(c), None) => VectorComponent::from_char(c)?,
        _ => return None,
    };
    let stream = streams.iter().position(|(name, data_type)| {
        *name == base && data_type.element_count() as usize > component.index()
    })?;
    trace!(slot = %desc.name, stream = base, "bound vector stream component");
    Some(Located {
        stream,
        component: component.index(),
        split: true,
    })
}

/// Matches program slots to streams by name, or by position when name
/// mapping is off. `None` marks a slot without a stream.
fn match_slots(
    kind: &'static str,
    slots: &[StreamDesc],
    streams: &[(&str, StreamDataType)],
    flags: ExecuteFlags,
    allow_missing: bool,
) -> Result<Vec<Option<Located>>, ExecuteError> {
    if flags.map_streams_by_name {
        return Ok(slots.iter().map(|desc| locate(streams, desc, flags)).collect());
    }

    let count_ok = if allow_missing {
        streams.len() <= slots.len()
    } else {
        streams.len() == slots.len()
    };
    if !count_ok {
        return Err(ExecuteError::StreamCountMismatch {
            kind,
            expected: slots.len(),
            actual: streams.len(),
        });
    }
    Ok((0..slots.len())
        .map(|stream| {
            (stream < streams.len()).then_some(Located {
                stream,
                component: 0,
                split: false,
            })
        })
        .collect())
}

/// Checks element type compatibility and buffer size, returning the byte
/// offset of the addressed component.
fn validate(
    desc: &StreamDesc,
    located: Located,
    name: &str,
    data_type: StreamDataType,
    stride: usize,
    len: usize,
    num_instances: usize,
) -> Result<usize, ExecuteError> {
    let expected = desc.data_type.register_type();
    let scalar_view = located.split || data_type.element_count() == 1;
    if data_type.register_type() != expected || !scalar_view {
        return Err(ExecuteError::StreamTypeMismatch {
            name: name.to_string(),
            expected,
            actual: data_type,
        });
    }

    let offset = located.component * data_type.element_size();
    let required = required_bytes(num_instances, stride, offset, data_type.element_size());
    if required > len {
        return Err(ExecuteError::StreamTooSmall {
            name: name.to_string(),
            required,
            actual: len,
        });
    }
    Ok(offset)
}

pub(crate) fn bind_inputs<'a>(
    program: &ByteCodeProgram,
    inputs: &[ProcessingStream<'a>],
    num_instances: usize,
    flags: ExecuteFlags,
) -> Result<Vec<InputView<'a>>, ExecuteError> {
    let streams: Vec<_> = inputs.iter().map(|s| (s.name(), s.data_type())).collect();
    let matched = match_slots("input", program.inputs(), &streams, flags, false)?;

    program
        .inputs()
        .iter()
        .zip(matched)
        .map(|(desc, located)| {
            let located = located.ok_or_else(|| ExecuteError::InputNotFound {
                name: desc.name.clone(),
            })?;
            let stream = &inputs[located.stream];
            let offset = validate(
                desc,
                located,
                stream.name(),
                stream.data_type(),
                stream.stride(),
                stream.bytes().len(),
                num_instances,
            )?;
            Ok(InputView {
                data: &stream.bytes()[offset..],
                stride: stream.stride(),
                element: stream.data_type().element(),
            })
        })
        .collect()
}

pub(crate) fn bind_outputs(
    program: &ByteCodeProgram,
    outputs: &[ProcessingStreamMut<'_>],
    num_instances: usize,
    flags: ExecuteFlags,
) -> Result<Vec<Option<OutputSlot>>, ExecuteError> {
    let streams: Vec<_> = outputs.iter().map(|s| (s.name(), s.data_type())).collect();
    let matched = match_slots(
        "output",
        program.outputs(),
        &streams,
        flags,
        flags.allow_missing_outputs,
    )?;

    program
        .outputs()
        .iter()
        .zip(matched)
        .map(|(desc, located)| {
            let Some(located) = located else {
                if flags.allow_missing_outputs {
                    warn!(output = %desc.name, "no stream for output, stores skipped");
                    return Ok(None);
                }
                return Err(ExecuteError::OutputNotFound {
                    name: desc.name.clone(),
                });
            };
            let stream = &outputs[located.stream];
            let offset = validate(
                desc,
                located,
                stream.name(),
                stream.data_type(),
                stream.stride(),
                stream.bytes().len(),
                num_instances,
            )?;
            Ok(Some(OutputSlot {
                stream: located.stream,
                offset,
                stride: stream.stride(),
                element: stream.data_type().element(),
            }))
        })
        .collect()
}

pub(crate) fn bind_functions(
    program: &ByteCodeProgram,
    table: &IndexMap<String, ExpressionFunction>,
) -> Result<Vec<NativeFunction>, ExecuteError> {
    program
        .functions()
        .iter()
        .map(|desc| {
            let name = desc.mangled_name();
            match table.get(&name) {
                None => Err(ExecuteError::FunctionNotFound { name }),
                Some(function) if function.desc != *desc => {
                    Err(ExecuteError::FunctionSignatureMismatch { name })
                }
                Some(function) => Ok(function.func),
            }
        })
        .collect()
}
