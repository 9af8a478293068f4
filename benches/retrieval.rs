//! Rule-retrieval throughput on a synthetic two-corpus rule collection.

use citecheck::corpus::RuleCorpus;
use citecheck::retrieval::RuleRetriever;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

const TOPICS: &[&str] = &[
    "case names and party abbreviations in the reporter tables",
    "explanatory parenthetical text begins lowercase after the citation",
    "pincite page references follow the word at in the citation",
    "non-breaking spaces join section symbols to their numbers",
    "statute citations list the title number and section symbol",
    "congressional reports cite the chamber and report number",
    "law review articles list author title volume journal and page",
    "curly quotation marks are required throughout citation text",
];

fn synthetic_corpus(rules_per_corpus: usize) -> Arc<RuleCorpus> {
    let make_rules = |prefix: &str| -> String {
        let rules: Vec<String> = (0..rules_per_corpus)
            .map(|i| {
                let topic = TOPICS[i % TOPICS.len()];
                format!(
                    r#"{{"id": "{}-{}", "title": "Rule {}", "text": "Rule {} provides that {}."}}"#,
                    prefix, i, i, i, topic
                )
            })
            .collect();
        format!(r#"{{"rules": [{}]}}"#, rules.join(","))
    };

    let json = format!(
        r#"{{"local_style": {}, "general_style": {}}}"#,
        make_rules("local"),
        make_rules("gen")
    );

    Arc::new(RuleCorpus::from_str(&json).expect("synthetic corpus parses"))
}

fn bench_retrieval(c: &mut Criterion) {
    let corpus = synthetic_corpus(400);
    let retriever = RuleRetriever::new(corpus).expect("retriever builds");
    let citation = "See Alice Corp. v. CLS Bank Int'l, 573 U.S. 208, at 216 (2014)";

    c.bench_function("retrieve_rules_800_records", |b| {
        b.iter(|| retriever.retrieve(black_box(citation), 8, 12))
    });

    c.bench_function("extract_terms", |b| {
        b.iter(|| retriever.extract_terms(black_box(citation)))
    });
}

criterion_group!(benches, bench_retrieval);
criterion_main!(benches);
