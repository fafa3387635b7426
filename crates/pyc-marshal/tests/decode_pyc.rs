//! End-to-end decoding of `.pyc`-shaped inputs.

use pyc_marshal::{
    decode_pyc, decode_pyc_with, DecodeError, DecodeOptions, Field, Graph, Handle,
    InvalidationMode, TraceEvent, TraceValue, Value,
};

const FLAG_REF: u8 = 0x80;

/// Hand-assembles a `.pyc` file.
struct PycBuilder {
    buf: Vec<u8>,
}

impl PycBuilder {
    fn timestamp(magic: u16, mtime: u32, size: u32) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(&magic.to_le_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&mtime.to_le_bytes());
        buf.extend_from_slice(&size.to_le_bytes());
        Self { buf }
    }

    fn tag(mut self, tag: u8) -> Self {
        self.buf.push(tag);
        self
    }
    fn ref_tag(self, tag: u8) -> Self {
        self.tag(tag | FLAG_REF)
    }
    fn byte(self, b: u8) -> Self {
        self.tag(b)
    }
    fn i32(mut self, v: i32) -> Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }
    fn short_str(self, tag: u8, s: &str) -> Self {
        self.byte(tag).byte(s.len() as u8).raw(s.as_bytes())
    }
    fn bytes(self, b: &[u8]) -> Self {
        self.tag(b's').i32(b.len() as i32).raw(b)
    }
    fn back_ref(self, index: i32) -> Self {
        self.tag(b'r').i32(index)
    }
    fn counters(self, argcount: i32, nlocals: i32, stacksize: i32, flags: i32) -> Self {
        self.i32(argcount).i32(0).i32(0).i32(nlocals).i32(stacksize).i32(flags)
    }
    fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// `x = 1` compiled as a module, with the reference flags a real writer sets.
fn module_assign() -> Vec<u8> {
    PycBuilder::timestamp(3413, 1_700_000_000, 6)
        .ref_tag(b'c') // #0
        .counters(0, 0, 1, 0x40)
        .bytes(b"d\x00Z\x00d\x01S\x00")
        .ref_tag(b')') // #1
        .byte(2)
        .tag(b'i')
        .i32(1)
        .tag(b'N')
        .ref_tag(b')') // #2
        .byte(1)
        .short_str(b'Z' | FLAG_REF, "x") // #3
        .ref_tag(b')') // #4
        .byte(0)
        .back_ref(4)
        .back_ref(4)
        .short_str(b'z' | FLAG_REF, "x.py") // #5
        .short_str(b'Z' | FLAG_REF, "<module>") // #6
        .i32(1)
        .bytes(b"")
        .build()
}

fn code_of<'g, 'a>(graph: &'g Graph<'a>, handle: Handle) -> &'g pyc_marshal::Code {
    match graph.get(handle) {
        Value::Code(code) => code,
        other => panic!("expected code, got {other:?}"),
    }
}

#[test]
fn test_module_code_object() {
    let data = module_assign();
    let pyc = decode_pyc(&data).unwrap();

    assert_eq!(
        pyc.header.mode,
        InvalidationMode::Timestamp { mtime: 1_700_000_000, source_size: 6 }
    );
    assert!(pyc.header.code_layout_matches());

    let graph = &pyc.graph;
    let code = code_of(graph, graph.root());
    assert_eq!(code.stacksize, 1);
    assert_eq!(code.flags, 0x40);
    assert_eq!(graph.get(code.filename).as_str(), Some("x.py"));
    assert_eq!(graph.get(code.name).as_str(), Some("<module>"));

    let consts = graph.get(code.consts).as_seq().unwrap();
    assert_eq!(graph.get(consts[0]), &Value::Int32(1));
    assert_eq!(graph.get(consts[1]), &Value::None);

    let names = graph.get(code.names).as_seq().unwrap();
    assert_eq!(graph.get(names[0]).as_str(), Some("x"));

    // The empty tuple is written once and referenced twice.
    assert_eq!(code.varnames, code.freevars);
    assert_eq!(code.varnames, code.cellvars);
    assert!(graph.is_shared(code.varnames));
    assert_eq!(graph.get(code.varnames), &Value::Tuple(vec![]));
}

#[test]
fn test_nested_function_and_constant_containers() {
    // def f(): return f   plus the constants frozenset({1, 2}) and a dict.
    let data = PycBuilder::timestamp(3425, 0, 0)
        .ref_tag(b'c') // #0 module
        .counters(0, 0, 2, 0x40)
        .bytes(b"d\x00d\x01\x84\x00Z\x00")
        .ref_tag(b')') // #1 consts
        .byte(4)
        .ref_tag(b'c') // #2 f
        .counters(0, 0, 1, 0x43)
        .bytes(b"t\x00S\x00")
        .tag(b')')
        .byte(1)
        .tag(b'N')
        .tag(b')')
        .byte(1)
        .short_str(b'Z' | FLAG_REF, "f") // #3
        .ref_tag(b')') // #4
        .byte(0)
        .back_ref(4)
        .back_ref(4)
        .short_str(b'z' | FLAG_REF, "m.py") // #5
        .back_ref(3)
        .i32(1)
        .bytes(b"\x00\x01")
        .back_ref(3)
        .tag(b'>')
        .i32(2)
        .tag(b'i')
        .i32(1)
        .tag(b'i')
        .i32(2)
        .tag(b'{')
        .back_ref(3)
        .back_ref(2)
        .tag(b'0')
        .tag(b')')
        .byte(1)
        .back_ref(3)
        .back_ref(4)
        .back_ref(4)
        .back_ref(4)
        .back_ref(5)
        .short_str(b'Z', "<module>")
        .i32(1)
        .bytes(b"")
        .build();

    let pyc = decode_pyc(&data).unwrap();
    assert_eq!(pyc.header.python_version(), Some((3, 9)));

    let graph = &pyc.graph;
    let module = code_of(graph, graph.root());
    let consts = graph.get(module.consts).as_seq().unwrap().to_vec();
    assert_eq!(consts.len(), 4);

    let f = code_of(graph, consts[0]);
    assert_eq!(f.flags, 0x43);
    // The function's name, the module's name constant and the dict key are one node.
    assert_eq!(f.name, consts[1]);
    assert_eq!(graph.get(f.name).as_str(), Some("f"));
    assert_eq!(f.filename, module.filename);

    assert!(matches!(graph.get(consts[2]), Value::FrozenSet(items) if items.len() == 2));

    let Value::Dict(entries) = graph.get(consts[3]) else {
        panic!("expected dict");
    };
    assert_eq!(entries, &vec![(consts[1], consts[0])]);
}

#[test]
fn test_trace_of_full_file() {
    let data = module_assign();
    let mut events: Vec<TraceEvent<'_>> = Vec::new();
    decode_pyc_with(&data, DecodeOptions::default(), &mut events).unwrap();

    // Events are emitted in stream order and never overlap.
    let mut end = 0;
    for event in &events {
        assert!(event.offset >= end, "{event:?} overlaps previous field");
        end = event.offset + event.len;
    }
    assert_eq!(end, data.len());

    let code_fields: Vec<&str> = events
        .iter()
        .filter_map(|e| match (e.depth, e.field) {
            (0, Field::Code(name)) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(
        code_fields,
        vec![
            "argcount",
            "posonlyargcount",
            "kwonlyargcount",
            "nlocals",
            "stacksize",
            "flags",
            "code",
            "consts",
            "names",
            "varnames",
            "freevars",
            "cellvars",
            "filename",
            "name",
            "firstlineno",
            "lnotab",
        ]
    );

    let refs: Vec<i32> = events
        .iter()
        .filter_map(|e| match e.value {
            TraceValue::Ref { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(refs, vec![4, 4]);
}

#[test]
fn test_truncated_file_fails_without_result() {
    let data = module_assign();
    for cut in [0, 3, 15, 16, 30, data.len() - 1] {
        let err = decode_pyc(&data[..cut]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }), "cut at {cut}: {err}");
    }
}

#[test]
fn test_bad_magic() {
    let mut data = module_assign();
    data[3] = 0;
    assert!(matches!(decode_pyc(&data), Err(DecodeError::InvalidMagic { .. })));
}

#[test]
fn test_strict_eof() {
    let mut data = module_assign();
    data.push(b'N');
    assert!(decode_pyc(&data).is_ok());
    let strict = DecodeOptions::new().with_require_eof(true);
    assert_eq!(
        decode_pyc_with(&data, strict, ()).unwrap_err(),
        DecodeError::TrailingBytes { count: 1 }
    );
}
