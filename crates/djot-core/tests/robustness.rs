//! Totality, determinism and bounded running time on arbitrary input.

use std::time::{Duration, Instant};

use djot_core::dump::{to_ast_json, to_matches_json};
use djot_core::{parse, render, Format};
use proptest::prelude::*;

/// Characters that exercise every block and inline construct.
const ALPHABET: &[char] = &[
    'a', 'b', ' ', ' ', '\n', '\n', '\t', '\\', '`', '$', '<', '>', ':', '[', ']', '(', ')', '!',
    '{', '}', '_', '*', '^', '~', '=', '+', '-', '#', '.', '|', '"', '%', '1', 'i', '^', 'é',
];

fn djotish() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(ALPHABET), 0..200)
        .prop_map(|chars| chars.into_iter().collect())
}

fn check_document(input: &str) {
    let doc = parse(input);
    assert_eq!(doc.span.end as usize, input.len());
    let html = render(&doc, Format::Html);
    assert_eq!(html, render(&parse(input), Format::Html));
    to_ast_json(&doc, true).unwrap();
    to_matches_json(&doc).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn parse_is_total_and_deterministic(input in djotish()) {
        check_document(&input);
    }

    #[test]
    fn parse_is_total_on_any_string(input in any::<String>()) {
        check_document(&input);
    }

    #[test]
    fn spans_stay_inside_the_source(input in djotish()) {
        let doc = parse(&input);
        for m in djot_core::dump::matches(&doc) {
            prop_assert!(m.start <= m.end, "{:?}", m);
            prop_assert!(m.end as usize <= input.len(), "{:?}", m);
        }
    }
}

// ============================================================================
// Noisy documents
// ============================================================================

struct Lcg {
    state: u64,
}

const SEED: u64 = 0x5eed;
const VARIANT_COUNT: usize = 32;
const MAX_MUTATION_STEPS: usize = 4;

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    fn choose(&mut self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        (self.next_u32() as usize) % max
    }
}

const BASE: &str = "# Title

Paragraph with _emphasis_ and a [link][ref].

- one
- [ ] two

``` rust
fn main() {}
```

::: note
> quoted[^n]
:::

| a | b |
|---|--:|
| 1 | 2 |

[ref]: /url

[^n]: The note.
";

fn mutate(mut input: String, rng: &mut Lcg) -> String {
    for _ in 0..=rng.choose(MAX_MUTATION_STEPS) {
        let boundaries: Vec<usize> = (0..=input.len())
            .filter(|&i| input.is_char_boundary(i))
            .collect();
        let at = boundaries[rng.choose(boundaries.len())];
        match rng.choose(4) {
            0 => {
                if let Some(end) = input[at..].find('\n') {
                    input.replace_range(at..at + end + 1, "");
                }
            }
            1 => input.truncate(at),
            2 => input.insert_str(at, ["`", "[", "{", "*", "\n\n", ":::\n"][rng.choose(6)]),
            _ => {
                let line = input.lines().nth(rng.choose(input.lines().count())).unwrap_or("").to_string();
                input.insert_str(at, &format!("{}\n", line));
            }
        }
    }
    input
}

#[test]
fn noisy_documents_parse() {
    let mut rng = Lcg::new(SEED);
    for _ in 0..VARIANT_COUNT {
        let variant = mutate(BASE.to_string(), &mut rng);
        check_document(&variant);
    }
}

// ============================================================================
// Pathological inputs
// ============================================================================

/// Generous wall-clock bound; quadratic behavior blows far past it.
const BOUND: Duration = Duration::from_secs(5);
const N: usize = 20_000;

fn assert_fast(name: &str, input: &str) {
    let started = Instant::now();
    let doc = parse(input);
    let html = render(&doc, Format::Html);
    let elapsed = started.elapsed();
    assert!(!html.is_empty() || input.trim().is_empty());
    assert!(
        elapsed < BOUND,
        "{} ({} bytes) took {:?}",
        name,
        input.len(),
        elapsed
    );
}

#[test]
fn deep_brackets() {
    assert_fast("nested brackets", &("[".repeat(N) + &"]".repeat(N)));
    assert_fast("unclosed brackets", &"[a".repeat(N));
    assert_fast("image openers", &"![".repeat(N));
}

#[test]
fn many_openers() {
    assert_fast("emphasis openers", &"_a *b ".repeat(N));
    assert_fast("braced openers", &"{_{*{=".repeat(N));
    assert_fast("unmatched closers", &"a_ b* ".repeat(N));
    assert_fast("alternating", &("*_".repeat(1_000) + &"_*".repeat(1_000)));
}

#[test]
fn many_unclosed_destinations() {
    assert_fast("destinations", &"[a](b".repeat(N));
    assert_fast("nested parens", &("[a](".to_string() + &"(".repeat(N)));
    assert_fast("reference labels", &"[a][b".repeat(N));
    assert_fast("unclosed with emphasis", &"[*a](x ".repeat(N));
    assert_fast("paren nesting", &"[a](( ".repeat(N));
}

#[test]
fn long_backtick_runs() {
    let mut input = String::new();
    for k in 1..=1_000 {
        input.push_str(&"`".repeat(k));
        input.push('a');
    }
    assert_fast("increasing runs", &input);
    assert_fast("single run", &"`".repeat(N));
    assert_fast("math openers", &"$`a".repeat(N));
    assert_fast("dollar run", &"$".repeat(N * 5));
}

#[test]
fn attribute_blocks() {
    assert_fast("unterminated attrs", &"{.a ".repeat(N));
    assert_fast("word attrs", &"w{#x}".repeat(N));
}

#[test]
fn block_nesting() {
    assert_fast("quotes", &("> ".repeat(500) + "deep\n"));
    let lists: String = (0..300).map(|k| " ".repeat(k * 2) + "- item\n\n").collect();
    assert_fast("lists", &lists);
    assert_fast("many divs", &":::\n".repeat(N / 4));
    assert_fast("many lines", &"line\n".repeat(N));
}
