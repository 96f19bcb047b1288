use file_chunker::text_splitter::{boundary_priority, Chunker, TextSplitter};
use proptest::prelude::*;

fn chunker(size: usize, overlap: usize) -> Chunker {
    Chunker::new(size, overlap).expect("valid chunker parameters")
}

fn alphabet_text(len: usize) -> String {
    (0..len).map(|i| (b'a' + (i % 26) as u8) as char).collect()
}

#[test]
fn empty_input_yields_no_pieces() {
    let pieces = chunker(10, 2).split_text("").expect("split succeeds");
    assert!(pieces.is_empty());
}

#[test]
fn short_input_is_returned_whole() {
    let text = "短い文。";
    let pieces = chunker(10, 2).split_text(text).expect("split succeeds");
    assert_eq!(pieces, vec![text.to_string()]);
}

#[test]
fn invalid_parameters_list_every_violation() {
    let err = Chunker::new(0, 0).expect_err("zero chunk size is invalid");
    assert_eq!(err.violations().len(), 2, "both rules are reported: {err}");

    let err = Chunker::new(10, 10).expect_err("overlap equal to size is invalid");
    assert_eq!(err.violations().len(), 1);
    assert!(err.to_string().contains("chunk_overlap"));
}

#[test]
fn priorities_follow_boundary_table() {
    assert_eq!(boundary_priority('\n'), 4);
    for ch in ['。', '！', '？', ')', '）', '!', '?'] {
        assert_eq!(boundary_priority(ch), 3, "{ch:?}");
    }
    for ch in [';', '；', '…', ':', '：'] {
        assert_eq!(boundary_priority(ch), 2, "{ch:?}");
    }
    for ch in [',', '，', '\t', ' ', '.'] {
        assert_eq!(boundary_priority(ch), 1, "{ch:?}");
    }
    assert_eq!(boundary_priority('x'), 0);
}

#[test]
fn cuts_after_sentence_end_and_drops_overlap_at_boundary() {
    let text = "aaaaaa。bbbbbbbbbbbb";
    let pieces = chunker(10, 2).split_text(text).expect("split succeeds");
    // second piece has no boundary and runs forward to the end of the text
    assert_eq!(pieces, vec!["aaaaaa。".to_string(), "bbbbbbbbbbbb".to_string()]);
}

#[test]
fn newline_beats_closer_spaces() {
    let text = "ab cd\nef gh ij";
    let pieces = chunker(10, 0).split_text(text).expect("split succeeds");
    assert_eq!(pieces, vec!["ab cd\n".to_string(), "ef gh ij".to_string()]);
}

#[test]
fn text_without_boundaries_keeps_configured_overlap() {
    let text = alphabet_text(300);
    let c = chunker(50, 10);
    let chars: Vec<char> = text.chars().collect();
    let spans = c.split_spans(&chars);
    assert_eq!(spans, vec![0..50, 40..90, 80..130, 120..170, 160..300]);

    let pieces = c.split_text(&text).expect("split succeeds");
    assert_eq!(pieces.len(), 5);
    assert_eq!(&pieces[0][40..], &pieces[1][..10], "consecutive pieces share the overlap");
}

#[test]
fn blank_pieces_are_skipped() {
    let text = format!("{}\n{}\n", "x".repeat(8), " ".repeat(30));
    let pieces = chunker(10, 0).split_text(&text).expect("split succeeds");
    assert!(pieces.iter().all(|p| !p.trim().is_empty()), "{pieces:?}");
    assert_eq!(pieces[0], format!("{}\n", "x".repeat(8)));
}

#[test]
fn cjk_text_is_measured_in_chars() {
    let sentence = "这是一个用于测试的中文句子共有二十字。";
    let text = sentence.repeat(4);
    let pieces = chunker(25, 5).split_text(&text).expect("split succeeds");
    assert!(pieces.len() >= 4, "{pieces:?}");
    for p in &pieces {
        assert!(p.ends_with('。'), "cut at sentence end: {p}");
        assert!(p.chars().count() <= 25);
    }
}

/// Property: spans leave no gap, always advance and end at the text length.
#[test]
fn proptest_spans_cover_text_and_terminate() {
    proptest!(|(text in "[a-z 。，\n]{0,400}", size in 1usize..80, seed in 0usize..80)| {
        let overlap = seed % size;
        let c = Chunker::new(size, overlap).expect("valid parameters");
        let chars: Vec<char> = text.chars().collect();
        let spans = c.split_spans(&chars);

        if chars.is_empty() {
            prop_assert!(spans.is_empty());
            return Ok(());
        }
        prop_assert_eq!(spans[0].start, 0);
        prop_assert_eq!(spans[spans.len() - 1].end, chars.len());
        prop_assert!(spans.len() <= chars.len(), "at most one span per char");
        for pair in spans.windows(2) {
            prop_assert!(pair[1].start > pair[0].start, "cursor advances");
            prop_assert!(pair[1].start <= pair[0].end, "no gap between pieces");
        }
    });
}

/// Property: pieces are exactly the non-blank spans, in order.
#[test]
fn proptest_pieces_match_spans() {
    proptest!(|(text in "[a-zあ-ん 。\n]{1,300}", size in 1usize..60)| {
        let c = Chunker::new(size, size / 3).expect("valid parameters");
        let pieces = c.split_text(&text).expect("split succeeds");
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= size {
            prop_assert_eq!(pieces, vec![text.clone()]);
            return Ok(());
        }
        let expected: Vec<String> = c
            .split_spans(&chars)
            .into_iter()
            .map(|r| chars[r].iter().collect::<String>())
            .filter(|p| !p.trim().is_empty())
            .collect();
        prop_assert_eq!(pieces, expected);
    });
}
