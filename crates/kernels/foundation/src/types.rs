//! Register, stream and function type model.
//!
//! Three families of types meet in the VM:
//!
//! - [`RegisterType`] / [`DataType`]: what a computed value is (bool, int or
//!   float, with 1-4 elements). Only scalar data types survive compilation.
//! - [`StreamDataType`]: how a value is stored in an external buffer
//!   (half/float or byte/short/int elements, 1-4 components).
//! - [`FunctionDesc`]: the signature of a native function the VM can call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The class of value held in a register.
///
/// Ordered `Unknown < Bool < Int < Float`. Overload resolution uses the
/// ordering to measure how far an argument has to be widened or narrowed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum RegisterType {
    #[default]
    Unknown,
    Bool,
    Int,
    Float,
}

impl RegisterType {
    /// Number of register types, used as the narrowing penalty factor.
    pub const COUNT: i32 = 4;

    /// Single-letter tag used in mangled function names.
    pub const fn mangle_char(self) -> char {
        match self {
            RegisterType::Unknown => 'U',
            RegisterType::Bool => 'B',
            RegisterType::Int => 'I',
            RegisterType::Float => 'F',
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RegisterType::Unknown => "unknown",
            RegisterType::Bool => "bool",
            RegisterType::Int => "int",
            RegisterType::Float => "float",
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A register type together with an element count (1-4).
///
/// The unknown type always has zero elements, so every unresolved node
/// compares equal to [`DataType::UNKNOWN`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataType {
    register: RegisterType,
    elements: u8,
}

impl DataType {
    pub const UNKNOWN: Self = Self {
        register: RegisterType::Unknown,
        elements: 0,
    };
    pub const BOOL: Self = Self::new(RegisterType::Bool, 1);
    pub const INT: Self = Self::new(RegisterType::Int, 1);
    pub const FLOAT: Self = Self::new(RegisterType::Float, 1);

    /// Creates a data type. Element counts are clamped to 1..=4 unless the
    /// register type is unknown.
    pub const fn new(register: RegisterType, elements: u8) -> Self {
        if matches!(register, RegisterType::Unknown) {
            return Self::UNKNOWN;
        }
        let elements = if elements == 0 {
            1
        } else if elements > 4 {
            4
        } else {
            elements
        };
        Self { register, elements }
    }

    #[inline]
    pub const fn register_type(self) -> RegisterType {
        self.register
    }

    #[inline]
    pub const fn element_count(self) -> u8 {
        self.elements
    }

    #[inline]
    pub const fn is_unknown(self) -> bool {
        matches!(self.register, RegisterType::Unknown)
    }

    #[inline]
    pub const fn is_scalar(self) -> bool {
        self.elements == 1
    }

    /// Same register type with a different element count.
    #[inline]
    pub const fn with_elements(self, elements: u8) -> Self {
        Self::new(self.register, elements)
    }

    /// Same register type, one element.
    #[inline]
    pub const fn scalar(self) -> Self {
        self.with_elements(1)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements <= 1 {
            f.write_str(self.register.name())
        } else {
            write!(f, "{}{}", self.register.name(), self.elements)
        }
    }
}

/// Element encoding of an external data stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamElement {
    Half,
    Float,
    Byte,
    Short,
    Int,
}

impl StreamElement {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            StreamElement::Byte => 1,
            StreamElement::Half | StreamElement::Short => 2,
            StreamElement::Float | StreamElement::Int => 4,
        }
    }

    /// Register type the element is loaded into.
    pub const fn register_type(self) -> RegisterType {
        match self {
            StreamElement::Half | StreamElement::Float => RegisterType::Float,
            StreamElement::Byte | StreamElement::Short | StreamElement::Int => RegisterType::Int,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StreamElement::Half => "half",
            StreamElement::Float => "float",
            StreamElement::Byte => "byte",
            StreamElement::Short => "short",
            StreamElement::Int => "int",
        }
    }
}

/// Stream element type with a component count (1-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamDataType {
    element: StreamElement,
    count: u8,
}

impl StreamDataType {
    pub const HALF: Self = Self::new(StreamElement::Half, 1);
    pub const FLOAT: Self = Self::new(StreamElement::Float, 1);
    pub const BYTE: Self = Self::new(StreamElement::Byte, 1);
    pub const SHORT: Self = Self::new(StreamElement::Short, 1);
    pub const INT: Self = Self::new(StreamElement::Int, 1);

    pub const fn new(element: StreamElement, count: u8) -> Self {
        let count = if count == 0 {
            1
        } else if count > 4 {
            4
        } else {
            count
        };
        Self { element, count }
    }

    #[inline]
    pub const fn element(self) -> StreamElement {
        self.element
    }

    #[inline]
    pub const fn element_count(self) -> u8 {
        self.count
    }

    #[inline]
    pub const fn element_size(self) -> usize {
        self.element.size()
    }

    /// Size of one full (all components) value in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        self.element.size() * self.count as usize
    }

    #[inline]
    pub const fn register_type(self) -> RegisterType {
        self.element.register_type()
    }

    /// The single-component version of this type.
    #[inline]
    pub const fn scalar(self) -> Self {
        Self::new(self.element, 1)
    }

    /// The register-side data type a stream of this type produces.
    #[inline]
    pub const fn data_type(self) -> DataType {
        DataType::new(self.element.register_type(), self.count)
    }
}

impl fmt::Display for StreamDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            f.write_str(self.element.name())
        } else {
            write!(f, "{}{}", self.element.name(), self.count)
        }
    }
}

/// A named external data stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamDesc {
    pub name: String,
    pub data_type: StreamDataType,
}

impl StreamDesc {
    pub fn new(name: impl Into<String>, data_type: StreamDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl fmt::Display for StreamDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.data_type, self.name)
    }
}

/// Signature of a native function.
///
/// Several descriptors may share a name; they are told apart by their
/// [mangled name](FunctionDesc::mangled_name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionDesc {
    pub name: String,
    pub input_types: Vec<RegisterType>,
    pub output_type: RegisterType,
    /// Arguments that must be supplied; trailing inputs past this are optional.
    pub num_required_inputs: u8,
}

impl FunctionDesc {
    /// Creates a descriptor where every input is required.
    pub fn new(
        name: impl Into<String>,
        input_types: Vec<RegisterType>,
        output_type: RegisterType,
    ) -> Self {
        let num_required_inputs = input_types.len() as u8;
        Self {
            name: name.into(),
            input_types,
            output_type,
            num_required_inputs,
        }
    }

    /// Marks trailing inputs beyond `count` as optional.
    pub fn with_required_inputs(mut self, count: u8) -> Self {
        self.num_required_inputs = count.min(self.input_types.len() as u8);
        self
    }

    /// Name plus one tag per input type, e.g. `scale_FI`.
    pub fn mangled_name(&self) -> String {
        let mut mangled = String::with_capacity(self.name.len() + 1 + self.input_types.len());
        mangled.push_str(&self.name);
        mangled.push('_');
        mangled.extend(self.input_types.iter().map(|t| t.mangle_char()));
        mangled
    }
}

/// Vector component selector for swizzles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VectorComponent {
    X,
    Y,
    Z,
    W,
}

impl VectorComponent {
    pub const ALL: [VectorComponent; 4] = [
        VectorComponent::X,
        VectorComponent::Y,
        VectorComponent::Z,
        VectorComponent::W,
    ];

    /// Accepts `xyzw` and `rgba`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'x' | 'r' => Some(VectorComponent::X),
            'y' | 'g' => Some(VectorComponent::Y),
            'z' | 'b' => Some(VectorComponent::Z),
            'w' | 'a' => Some(VectorComponent::W),
            _ => None,
        }
    }

    #[inline]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index & 3]
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_char(self) -> char {
        match self {
            VectorComponent::X => 'x',
            VectorComponent::Y => 'y',
            VectorComponent::Z => 'z',
            VectorComponent::W => 'w',
        }
    }
}
