use crate::analysis::analyzer::Analyzer;
use crate::analysis::charset::Collation;
use crate::analysis::token::BoolToken;
use crate::analysis::tokenizer::BoolTokens;
use crate::query::ast::{NodeId, QueryTree, ROOT};
use crate::scoring::scorer::boolean_weight;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    EndOfInput,
    Paren,
    Quote,
}

/// Recursive-descent parser for boolean-mode queries.
///
/// Never fails: an unclosed group or phrase closes at end of input, a stray
/// `)` is ignored. Stopwords are dropped unless truncated; groups left
/// without words are removed.
pub struct BooleanParser<'a> {
    pub analyzer: &'a Analyzer,
    pub collation: Collation,
}

impl<'a> BooleanParser<'a> {
    pub fn new(analyzer: &'a Analyzer, collation: Collation) -> Self {
        BooleanParser { analyzer, collation }
    }

    pub fn parse(&self, query: &[u8]) -> QueryTree {
        let mut tree = QueryTree::new();
        let mut tokens = self.analyzer.tokenizer.boolean_tokens(query);
        self.parse_group(&mut tokens, &mut tree, ROOT, Closer::EndOfInput);
        tracing::debug!(nodes = tree.len(), leaves = tree.leaves().count(), "boolean query parsed");
        tree
    }

    fn parse_group(&self, tokens: &mut BoolTokens<'_>, tree: &mut QueryTree, group: NodeId, closer: Closer) {
        while let Some(token) = tokens.next() {
            match token {
                BoolToken::Word(word, hints) => {
                    if !hints.trunc && self.analyzer.is_stopword(word.bytes, self.collation) {
                        tracing::trace!(word = %word.as_str_lossy(), "stopword dropped from query");
                        continue;
                    }
                    let key = self.collation.key(word.bytes);
                    if closer == Closer::Quote {
                        // Every word of a phrase is required
                        tree.add_word(group, key, 1, hints.trunc, boolean_weight(0, false));
                    } else {
                        let weight = boolean_weight(hints.plusminus, hints.pmsign);
                        tree.add_word(group, key, hints.yesno, hints.trunc, weight);
                    }
                }
                BoolToken::OpenGroup(hints) => {
                    let weight = boolean_weight(hints.plusminus, hints.pmsign);
                    let child = tree.add_group(group, hints.yesno, weight, false);
                    self.parse_group(tokens, tree, child, Closer::Paren);
                    tree.drop_if_empty(child);
                }
                BoolToken::PhraseStart(hints) => {
                    let weight = boolean_weight(hints.plusminus, hints.pmsign);
                    let child = tree.add_group(group, hints.yesno, weight, true);
                    self.parse_group(tokens, tree, child, Closer::Quote);
                    tree.drop_if_empty(child);
                }
                BoolToken::CloseGroup => {
                    if closer == Closer::Paren {
                        return;
                    }
                }
                BoolToken::PhraseEnd => {
                    if closer == Closer::Quote {
                        return;
                    }
                }
            }
        }
    }
}
