#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use weft_core::Value;
use weft_expr::{evaluate, parse, resolved_path_string, set_path};
use weft_reactive::VarContext;

#[derive(Arbitrary, Debug)]
enum Piece {
    Ident(u8),
    Dot,
    OpenBracket,
    CloseBracket,
    Number(i16),
    Quoted(Vec<u8>),
    Equals,
    In,
    Comma,
    Space,
    Brace,
}

impl Piece {
    fn render(&self, out: &mut String) {
        const IDENTS: [&str; 6] = ["user", "rows", "selected", "form", "i", "x"];
        match self {
            Piece::Ident(n) => out.push_str(IDENTS[*n as usize % IDENTS.len()]),
            Piece::Dot => out.push('.'),
            Piece::OpenBracket => out.push('['),
            Piece::CloseBracket => out.push(']'),
            Piece::Number(n) => out.push_str(&n.to_string()),
            Piece::Quoted(bytes) => {
                out.push('\'');
                for b in bytes {
                    let ch = (b & 0x7f) as char;
                    if ch != '\'' && ch != '\\' {
                        out.push(ch);
                    }
                }
                out.push('\'');
            }
            Piece::Equals => out.push_str(" = "),
            Piece::In => out.push_str(" in "),
            Piece::Comma => out.push(','),
            Piece::Space => out.push(' '),
            Piece::Brace => out.push('{'),
        }
    }
}

fuzz_target!(|pieces: Vec<Piece>| {
    let mut source = String::new();
    for piece in &pieces {
        if source.len() > 1024 {
            break;
        }
        piece.render(&mut source);
    }

    let Ok(parsed) = parse(&source) else { return };

    let ctx = VarContext::from_entries([
        ("user", Value::map([("name", Value::from("ada"))])),
        (
            "rows",
            Value::list([Value::from("a"), Value::from("b"), Value::from("c")]),
        ),
        ("selected", Value::from(1)),
        ("form", Value::map([("title", Value::from("t"))])),
        ("i", Value::from(0)),
        ("x", Value::from(true)),
    ]);

    // Interpretation must never panic, whatever shape parsing produced.
    let _ = evaluate(&parsed, &ctx, false);
    let _ = evaluate(&parsed, &ctx, true);
    if let Ok(path) = resolved_path_string(&parsed, &ctx) {
        if !path.is_empty() {
            if let Some(variable) = ctx.get(parsed.var_name()) {
                let _ = set_path(&variable, &path, Value::from(1), true);
            }
        }
    }
});
