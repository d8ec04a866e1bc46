// Rule-based Linguistic Analyzer
// Offline fallback when the spaCy service is unreachable:
// - sentence boundaries from a character scanner
// - lemmas from an irregular-form table plus suffix rules
// - a lexicon tagger that distinguishes verbs, auxiliaries and pronouns

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use super::{AnalyzerError, LinguisticAnalyzer, TokenAnnotation};

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "e.g", "i.e", "fig",
];

const BE_FORMS: &[(&str, &str)] = &[
    ("be", "VB"),
    ("am", "VBP"),
    ("is", "VBZ"),
    ("are", "VBP"),
    ("was", "VBD"),
    ("were", "VBD"),
    ("been", "VBN"),
    ("being", "VBG"),
];

const HAVE_FORMS: &[(&str, &str)] = &[
    ("have", "VBP"),
    ("has", "VBZ"),
    ("had", "VBD"),
    ("having", "VBG"),
];

const DO_FORMS: &[(&str, &str)] = &[("do", "VBP"), ("does", "VBZ"), ("did", "VBD")];

const MODALS: &[&str] = &[
    "will", "would", "shall", "should", "can", "could", "may", "might", "must",
];

const CONTRACTIONS: &[(&str, &str)] = &[
    ("don't", "do"),
    ("doesn't", "does"),
    ("didn't", "did"),
    ("isn't", "is"),
    ("aren't", "are"),
    ("wasn't", "was"),
    ("weren't", "were"),
    ("haven't", "have"),
    ("hasn't", "has"),
    ("hadn't", "had"),
    ("can't", "can"),
    ("won't", "will"),
    ("wouldn't", "would"),
    ("couldn't", "could"),
    ("shouldn't", "should"),
];

const PERSONAL_PRONOUNS: &[&str] = &[
    "i", "me", "you", "he", "him", "she", "it", "we", "us", "they", "them", "myself",
    "yourself", "himself", "herself", "itself", "ourselves", "yourselves", "themselves",
    "mine", "yours", "hers", "ours", "theirs",
];

const POSSESSIVE_PRONOUNS: &[&str] = &["my", "your", "his", "its", "our", "their"];

const INDEFINITE_PRONOUNS: &[&str] = &[
    "something", "anything", "everything", "nothing", "someone", "anyone", "everyone",
    "somebody", "anybody", "everybody", "nobody",
];

const DEMONSTRATIVES: &[&str] = &["this", "that", "these", "those"];

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "every", "each", "some", "any", "no", "all", "both", "either", "neither",
    "another", "such",
];

const PREPOSITIONS: &[&str] = &[
    "on", "in", "at", "of", "for", "with", "by", "from", "about", "into", "over", "under",
    "after", "before", "through", "between", "against", "during", "without", "within",
    "along", "across", "behind", "beyond", "near", "since", "until", "upon", "around",
    "toward", "towards", "onto", "off", "out", "up", "down", "like",
];

const COORDINATORS: &[&str] = &["and", "or", "but", "nor"];

const SUBORDINATORS: &[&str] = &[
    "because", "although", "though", "while", "if", "whether", "unless", "whereas", "when",
    "where",
];

const ADVERBS: &[&str] = &[
    "very", "also", "just", "only", "often", "never", "always", "already", "still", "soon",
    "then", "now", "here", "there", "too", "quite", "rather", "almost", "again", "even",
    "ever", "perhaps", "yesterday", "today", "tomorrow", "once", "twice",
];

const UNINFLECTED: &[&str] = &[
    "always", "perhaps", "series", "species", "news", "lens", "yes", "sometimes", "towards",
    "afterwards", "besides", "physics", "mathematics", "this", "thus", "its", "his", "hers",
    "ours", "yours", "theirs", "was", "has", "does", "is", "as", "us", "less", "unless",
    "across", "analysis", "basis", "crisis", "bus", "gas", "during", "thing", "something",
    "nothing", "anything", "everything", "morning", "evening", "string", "spring", "ceiling",
    "wedding", "king", "sing", "bring", "ring", "wing", "swing", "sting", "red", "bed",
    "hundred", "indeed", "need", "speed", "seed", "feed", "weed", "shed",
];

const NOUN_IRREGULARS: &[(&str, &str)] = &[
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("wives", "wife"),
    ("knives", "knife"),
    ("wolves", "wolf"),
    ("halves", "half"),
    ("shelves", "shelf"),
];

/// (base, simple past, past participle)
const IRREGULAR_VERBS: &[(&str, &str, &str)] = &[
    ("go", "went", "gone"),
    ("sit", "sat", "sat"),
    ("run", "ran", "run"),
    ("write", "wrote", "written"),
    ("take", "took", "taken"),
    ("make", "made", "made"),
    ("say", "said", "said"),
    ("see", "saw", "seen"),
    ("come", "came", "come"),
    ("get", "got", "gotten"),
    ("give", "gave", "given"),
    ("know", "knew", "known"),
    ("think", "thought", "thought"),
    ("tell", "told", "told"),
    ("find", "found", "found"),
    ("leave", "left", "left"),
    ("feel", "felt", "felt"),
    ("keep", "kept", "kept"),
    ("begin", "began", "begun"),
    ("bring", "brought", "brought"),
    ("buy", "bought", "bought"),
    ("catch", "caught", "caught"),
    ("teach", "taught", "taught"),
    ("stand", "stood", "stood"),
    ("understand", "understood", "understood"),
    ("hold", "held", "held"),
    ("lead", "led", "led"),
    ("build", "built", "built"),
    ("send", "sent", "sent"),
    ("spend", "spent", "spent"),
    ("lose", "lost", "lost"),
    ("meet", "met", "met"),
    ("pay", "paid", "paid"),
    ("sell", "sold", "sold"),
    ("speak", "spoke", "spoken"),
    ("break", "broke", "broken"),
    ("choose", "chose", "chosen"),
    ("drive", "drove", "driven"),
    ("eat", "ate", "eaten"),
    ("fall", "fell", "fallen"),
    ("fly", "flew", "flown"),
    ("grow", "grew", "grown"),
    ("throw", "threw", "thrown"),
    ("wear", "wore", "worn"),
    ("win", "won", "won"),
    ("become", "became", "become"),
    ("draw", "drew", "drawn"),
    ("drink", "drank", "drunk"),
    ("forget", "forgot", "forgotten"),
    ("hide", "hid", "hidden"),
    ("ride", "rode", "ridden"),
    ("rise", "rose", "risen"),
    ("shake", "shook", "shaken"),
    ("sing", "sang", "sung"),
    ("sleep", "slept", "slept"),
    ("steal", "stole", "stolen"),
    ("swim", "swam", "swum"),
    ("wake", "woke", "woken"),
    ("fight", "fought", "fought"),
    ("feed", "fed", "fed"),
    ("hang", "hung", "hung"),
    ("lay", "laid", "laid"),
    ("lend", "lent", "lent"),
    ("mean", "meant", "meant"),
    ("seek", "sought", "sought"),
    ("tear", "tore", "torn"),
    ("blow", "blew", "blown"),
    ("bite", "bit", "bitten"),
    ("freeze", "froze", "frozen"),
    ("dig", "dug", "dug"),
    ("hear", "heard", "heard"),
    ("read", "read", "read"),
    ("put", "put", "put"),
    ("set", "set", "set"),
    ("let", "let", "let"),
    ("hit", "hit", "hit"),
    ("cut", "cut", "cut"),
    ("shut", "shut", "shut"),
    ("hurt", "hurt", "hurt"),
];

const REGULAR_VERBS: &[&str] = &[
    "chase", "walk", "talk", "jump", "play", "work", "look", "want", "need", "use", "ask",
    "call", "try", "help", "show", "turn", "start", "move", "like", "live", "believe",
    "happen", "include", "continue", "learn", "change", "follow", "stop", "create", "open",
    "close", "add", "allow", "appear", "consider", "expect", "remain", "suggest", "raise",
    "pass", "report", "decide", "pull", "push", "carry", "watch", "wait", "visit", "reach",
    "kill", "cover", "describe", "develop", "discover", "explain", "offer", "produce",
    "provide", "receive", "reduce", "replace", "require", "return", "save", "serve", "study",
    "travel", "copy", "paraphrase", "detect", "plagiarize", "modify", "reorder", "rewrite",
    "accept", "achieve", "adopt", "analyze", "apply", "argue", "arrive", "avoid", "claim",
    "compare", "contain", "define", "design", "enjoy", "enter", "establish", "examine",
    "improve", "increase", "decrease", "indicate", "introduce", "involve", "join", "kick",
    "laugh", "listen", "love", "manage", "mention", "miss", "notice", "obtain", "occur",
    "own", "paint", "pick", "plan", "prefer", "prepare", "present", "prevent", "protect",
    "prove", "publish", "recognize", "remember", "remove", "repeat", "seem", "share",
    "smile", "solve", "support", "suppose", "touch", "treat", "wish", "wonder", "worry",
    "hope", "cook", "clean", "climb", "cry", "dance", "drop", "fill", "finish", "hate",
    "hurry", "kiss", "knock", "marry", "order", "plant", "shout", "smell", "stay", "taste",
    "thank", "trust", "vote", "wash", "base", "note", "place", "realize", "determine",
    "evaluate", "generate", "measure", "operate", "propose", "translate", "close", "escape",
    "practice", "state", "declare", "agree", "die", "tie", "lie", "dress", "bake", "hire",
    "fire", "score", "type", "exchange", "replace", "borrow", "answer", "gather", "hunt",
];

const ING_NOUNS: &[&str] = &[
    "something", "nothing", "anything", "everything", "morning", "evening", "during",
    "string", "spring", "ceiling", "wedding", "pudding", "king", "thing", "wing", "ring",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerbForm {
    Base,
    ThirdPerson,
    Gerund,
    Past,
    Participle,
    PastOrParticiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuxFamily {
    Be,
    Have,
    Do,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WordClass {
    Punct,
    Num,
    Pronoun(&'static str),
    Possessive,
    Demonstrative,
    Det,
    Aux(AuxFamily, &'static str),
    Modal,
    Adp,
    To,
    Conj,
    Sconj,
    Not,
    Adv,
    Verb(VerbForm),
    Other,
}

struct Lexicon {
    verb_bases: HashSet<&'static str>,
    irregular_forms: HashMap<&'static str, (&'static str, VerbForm)>,
    noun_irregulars: HashMap<&'static str, &'static str>,
    uninflected: HashSet<&'static str>,
    ing_nouns: HashSet<&'static str>,
    aux_forms: HashMap<&'static str, (AuxFamily, &'static str)>,
}

fn lexicon() -> &'static Lexicon {
    static LEXICON: OnceLock<Lexicon> = OnceLock::new();
    LEXICON.get_or_init(|| {
        let mut verb_bases: HashSet<&'static str> = REGULAR_VERBS.iter().copied().collect();
        let mut irregular_forms = HashMap::new();
        for &(base, past, participle) in IRREGULAR_VERBS {
            verb_bases.insert(base);
            if past == participle {
                if past != base {
                    irregular_forms.insert(past, (base, VerbForm::PastOrParticiple));
                }
            } else {
                irregular_forms.insert(past, (base, VerbForm::Past));
                if participle != base {
                    irregular_forms.insert(participle, (base, VerbForm::Participle));
                }
            }
        }

        let mut aux_forms = HashMap::new();
        for &(form, tag) in BE_FORMS {
            aux_forms.insert(form, (AuxFamily::Be, tag));
        }
        for &(form, tag) in HAVE_FORMS {
            aux_forms.insert(form, (AuxFamily::Have, tag));
        }
        for &(form, tag) in DO_FORMS {
            aux_forms.insert(form, (AuxFamily::Do, tag));
        }

        Lexicon {
            verb_bases,
            irregular_forms,
            noun_irregulars: NOUN_IRREGULARS.iter().copied().collect(),
            uninflected: UNINFLECTED.iter().copied().collect(),
            ing_nouns: ING_NOUNS.iter().copied().collect(),
            aux_forms,
        }
    })
}

fn aux_lemma(family: AuxFamily) -> &'static str {
    match family {
        AuxFamily::Be => "be",
        AuxFamily::Have => "have",
        AuxFamily::Do => "do",
    }
}

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"\p{L}+(?:['’]\p{L}+)*|\d+(?:[.,]\d+)*|[^\s\p{L}\d]")
            .expect("token pattern is valid")
    })
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn undouble(stem: &str) -> Option<String> {
    let chars: Vec<char> = stem.chars().collect();
    let n = chars.len();
    if n >= 3 && chars[n - 1] == chars[n - 2] && !is_vowel(chars[n - 1]) && !matches!(chars[n - 1], 'l' | 's' | 'z') {
        Some(chars[..n - 1].iter().collect())
    } else {
        None
    }
}

fn strip_ing(word: &str, lex: &Lexicon) -> Option<String> {
    if word.chars().count() <= 5 || !word.ends_with("ing") || lex.ing_nouns.contains(word) {
        return None;
    }
    let stem = &word[..word.len() - 3];
    if let Some(short) = undouble(stem) {
        return Some(short);
    }
    let with_e = format!("{}e", stem);
    if lex.verb_bases.contains(with_e.as_str()) {
        return Some(with_e);
    }
    if stem.chars().any(is_vowel) {
        Some(stem.to_string())
    } else {
        None
    }
}

fn strip_ed(word: &str, lex: &Lexicon) -> Option<String> {
    if word.chars().count() <= 4 || !word.ends_with("ed") || word.ends_with("eed") {
        return None;
    }
    if let Some(stem) = word.strip_suffix("ied") {
        return Some(format!("{}y", stem));
    }
    let drop_d = &word[..word.len() - 1];
    if lex.verb_bases.contains(drop_d) {
        return Some(drop_d.to_string());
    }
    let stem = &word[..word.len() - 2];
    if let Some(short) = undouble(stem) {
        return Some(short);
    }
    Some(stem.to_string())
}

fn strip_plural(word: &str) -> Option<String> {
    let len = word.chars().count();
    if len > 4 {
        if let Some(stem) = word.strip_suffix("ies") {
            return Some(format!("{}y", stem));
        }
    }
    for suffix in ["sses", "shes", "ches", "xes", "zzes"] {
        if word.ends_with(suffix) {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    if len > 3
        && word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is")
    {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

/// Dictionary form of a single word, lowercased.
pub fn lemma_of(word: &str) -> String {
    let w = word.to_lowercase();
    let lex = lexicon();

    if let Some((family, _)) = lex.aux_forms.get(w.as_str()) {
        return aux_lemma(*family).to_string();
    }
    if let Some((base, _)) = lex.irregular_forms.get(w.as_str()) {
        return (*base).to_string();
    }
    if let Some(base) = lex.noun_irregulars.get(w.as_str()) {
        return (*base).to_string();
    }
    if lex.verb_bases.contains(w.as_str()) || lex.uninflected.contains(w.as_str()) || w.chars().count() <= 3 {
        return w;
    }

    strip_ing(&w, lex)
        .or_else(|| strip_ed(&w, lex))
        .or_else(|| strip_plural(&w))
        .unwrap_or(w)
}

fn starts_uppercase(word: &str) -> bool {
    word.chars().next().map_or(false, char::is_uppercase)
}

/// A single capital letter reads as a name initial ("J. Smith", "John F. Kennedy")
/// when it opens the sentence or follows a capitalised word, and a capitalised
/// word comes next.
fn is_initial(preceding: Option<&str>, letter: &str, rest: &[char]) -> bool {
    if !starts_uppercase(letter) {
        return false;
    }
    let next_upper = rest
        .iter()
        .find(|c| !c.is_whitespace())
        .map_or(false, |c| c.is_uppercase());
    next_upper && preceding.map_or(true, starts_uppercase)
}

fn is_abbreviation(buffer: &str, rest: &[char]) -> bool {
    let mut words = buffer
        .trim_end_matches('.')
        .split_whitespace()
        .rev();
    let last_word = words.next().unwrap_or("");
    if last_word.chars().count() == 1 && last_word.chars().all(|c| c.is_alphabetic()) {
        return is_initial(words.next(), last_word, rest);
    }
    ABBREVIATIONS.contains(&last_word.to_lowercase().as_str())
}

/// Sentence splitting by scanning terminal punctuation. Decimal points,
/// abbreviations and quoted speech do not end a sentence; blank lines do.
pub fn split_sentences_by_rules(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut buffer = String::new();
    let mut in_quote = false;
    let mut i = 0;

    let mut flush = |buffer: &mut String| {
        let sentence = buffer.trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        buffer.clear();
    };

    while i < chars.len() {
        let ch = chars[i];
        buffer.push(ch);

        let closes_quote = match ch {
            '"' => {
                in_quote = !in_quote;
                !in_quote
            }
            '\u{201c}' => {
                in_quote = true;
                false
            }
            '\u{201d}' => {
                in_quote = false;
                true
            }
            _ => false,
        };

        let at_break = i + 1 >= chars.len() || chars[i + 1].is_whitespace();
        if closes_quote && i > 0 && matches!(chars[i - 1], '.' | '!' | '?') && at_break {
            flush(&mut buffer);
            i += 1;
            continue;
        }

        if ch == '\n' && chars.get(i + 1) == Some(&'\n') {
            flush(&mut buffer);
            i += 1;
            continue;
        }

        if matches!(ch, '.' | '!' | '?') && !in_quote {
            if ch == '.' && i > 0 && i + 1 < chars.len() && chars[i - 1].is_ascii_digit() && chars[i + 1].is_ascii_digit() {
                i += 1;
                continue;
            }
            if ch == '.' && is_abbreviation(&buffer, &chars[i + 1..]) {
                i += 1;
                continue;
            }

            while i + 1 < chars.len()
                && matches!(chars[i + 1], '.' | '!' | '?' | '"' | '\'' | ')' | '\u{201d}' | '\u{2019}')
            {
                i += 1;
                buffer.push(chars[i]);
                if chars[i] == '"' || chars[i] == '\u{201d}' {
                    in_quote = false;
                }
            }

            if i + 1 >= chars.len() || chars[i + 1].is_whitespace() {
                flush(&mut buffer);
            }
        }

        i += 1;
    }

    flush(&mut buffer);
    sentences
}

fn classify_word(lower: &str, lex: &Lexicon) -> WordClass {
    if let Some(&(_, base)) = CONTRACTIONS.iter().find(|(form, _)| *form == lower) {
        return classify_word(base, lex);
    }
    if let Some((head, _)) = lower.split_once(|c: char| c == '\'' || c == '’') {
        return classify_word(head, lex);
    }

    let first = lower.chars().next().unwrap_or(' ');
    if !first.is_alphanumeric() {
        return WordClass::Punct;
    }
    if first.is_ascii_digit() {
        return WordClass::Num;
    }
    if PERSONAL_PRONOUNS.contains(&lower) || lower == "her" {
        return WordClass::Pronoun("PRP");
    }
    if POSSESSIVE_PRONOUNS.contains(&lower) {
        return WordClass::Possessive;
    }
    if INDEFINITE_PRONOUNS.contains(&lower) {
        return WordClass::Pronoun("NN");
    }
    match lower {
        "who" | "whom" | "what" => return WordClass::Pronoun("WP"),
        "whose" => return WordClass::Pronoun("WP$"),
        "not" => return WordClass::Not,
        "to" => return WordClass::To,
        _ => {}
    }
    if DEMONSTRATIVES.contains(&lower) {
        return WordClass::Demonstrative;
    }
    if DETERMINERS.contains(&lower) {
        return WordClass::Det;
    }
    if let Some(&(family, tag)) = lex.aux_forms.get(lower) {
        return WordClass::Aux(family, tag);
    }
    if MODALS.contains(&lower) {
        return WordClass::Modal;
    }
    if PREPOSITIONS.contains(&lower) {
        return WordClass::Adp;
    }
    if COORDINATORS.contains(&lower) {
        return WordClass::Conj;
    }
    if SUBORDINATORS.contains(&lower) {
        return WordClass::Sconj;
    }
    if ADVERBS.contains(&lower) || (lower.ends_with("ly") && lower.chars().count() > 4) {
        return WordClass::Adv;
    }
    if let Some(&(_, form)) = lex.irregular_forms.get(lower) {
        return WordClass::Verb(form);
    }
    if lex.verb_bases.contains(lower) {
        return WordClass::Verb(VerbForm::Base);
    }

    let lemma = lemma_of(lower);
    if lemma != lower && lex.verb_bases.contains(lemma.as_str()) {
        if lower.ends_with("ing") {
            return WordClass::Verb(VerbForm::Gerund);
        }
        if lower.ends_with("ed") {
            return WordClass::Verb(VerbForm::PastOrParticiple);
        }
        if lower.ends_with('s') {
            return WordClass::Verb(VerbForm::ThirdPerson);
        }
    }
    if !lex.uninflected.contains(lower) && lower.ends_with("ed") && lower.chars().count() > 4 && !lower.ends_with("eed") {
        return WordClass::Verb(VerbForm::PastOrParticiple);
    }
    WordClass::Other
}

fn is_skippable(class: &WordClass) -> bool {
    matches!(class, WordClass::Adv | WordClass::Not)
}

/// Nearest preceding class, skipping adverbs and negation.
fn previous_class(classes: &[WordClass], idx: usize) -> Option<&WordClass> {
    classes[..idx].iter().rev().find(|c| !is_skippable(c))
}

fn next_class(classes: &[WordClass], idx: usize) -> Option<&WordClass> {
    classes.get(idx + 1..)?.iter().find(|c| !is_skippable(c))
}

fn governed_by_aux(classes: &[WordClass], idx: usize) -> bool {
    classes[..idx]
        .iter()
        .rev()
        .take(3)
        .any(|c| matches!(c, WordClass::Aux(AuxFamily::Be, _) | WordClass::Aux(AuxFamily::Have, _)))
}

fn aux_has_verb_ahead(classes: &[WordClass], idx: usize) -> bool {
    classes
        .iter()
        .skip(idx + 1)
        .take(3)
        .filter(|c| !matches!(c, WordClass::Pronoun(_)))
        .any(|c| matches!(c, WordClass::Verb(_) | WordClass::Aux(AuxFamily::Be, "VBN")))
}

fn punct_tag(text: &str) -> &'static str {
    match text {
        "." | "!" | "?" => ".",
        "," => ",",
        _ => ":",
    }
}

fn noun_tag(text: &str, idx: usize) -> (&'static str, &'static str) {
    let first_upper = text.chars().next().map_or(false, |c| c.is_uppercase());
    if first_upper && idx > 0 {
        ("PROPN", "NNP")
    } else if strip_plural(&text.to_lowercase()).is_some() {
        ("NOUN", "NNS")
    } else {
        ("NOUN", "NN")
    }
}

/// Universal POS + Penn tag for every token of one sentence.
pub fn annotate_by_rules(sentence: &str) -> Vec<TokenAnnotation> {
    let lex = lexicon();
    let words: Vec<&str> = token_regex().find_iter(sentence).map(|m| m.as_str()).collect();
    let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let classes: Vec<WordClass> = lowered.iter().map(|w| classify_word(w, lex)).collect();

    words
        .iter()
        .enumerate()
        .map(|(idx, text)| {
            let lower = &lowered[idx];
            let prev = previous_class(&classes, idx);
            let next = next_class(&classes, idx);
            let nominal_context = matches!(
                prev,
                Some(WordClass::Det) | Some(WordClass::Possessive) | Some(WordClass::Num)
            ) || (idx > 0 && matches!(classes[idx - 1], WordClass::Demonstrative)
                && !matches!(next, None | Some(WordClass::Punct)));

            let (pos, tag): (&str, &str) = match &classes[idx] {
                WordClass::Punct => ("PUNCT", punct_tag(text)),
                WordClass::Num => ("NUM", "CD"),
                WordClass::Pronoun("PRP") if lower == "her" => match next {
                    Some(WordClass::Other) | Some(WordClass::Verb(_)) => ("PRON", "PRP$"),
                    _ => ("PRON", "PRP"),
                },
                WordClass::Pronoun(tag) => ("PRON", *tag),
                WordClass::Possessive => ("PRON", "PRP$"),
                WordClass::Demonstrative => match next {
                    None
                    | Some(WordClass::Punct)
                    | Some(WordClass::Aux(..))
                    | Some(WordClass::Modal)
                    | Some(WordClass::Verb(_)) => ("PRON", "DT"),
                    _ => ("DET", "DT"),
                },
                WordClass::Det => ("DET", "DT"),
                WordClass::Aux(AuxFamily::Be, tag) => ("AUX", *tag),
                WordClass::Aux(_, tag) => {
                    if aux_has_verb_ahead(&classes, idx) {
                        ("AUX", *tag)
                    } else {
                        ("VERB", *tag)
                    }
                }
                WordClass::Modal => ("AUX", "MD"),
                WordClass::Adp => ("ADP", "IN"),
                WordClass::To => match next {
                    Some(WordClass::Verb(VerbForm::Base)) => ("PART", "TO"),
                    _ => ("ADP", "IN"),
                },
                WordClass::Conj => ("CCONJ", "CC"),
                WordClass::Sconj => ("SCONJ", "IN"),
                WordClass::Not => ("PART", "RB"),
                WordClass::Adv => ("ADV", "RB"),
                WordClass::Verb(_) if nominal_context => noun_tag(text, idx),
                WordClass::Verb(form) => {
                    let tag = match form {
                        VerbForm::Base => match prev {
                            Some(WordClass::Modal)
                            | Some(WordClass::To)
                            | Some(WordClass::Aux(AuxFamily::Do, _)) => "VB",
                            _ => "VBP",
                        },
                        VerbForm::ThirdPerson => "VBZ",
                        VerbForm::Gerund => "VBG",
                        VerbForm::Past => "VBD",
                        VerbForm::Participle => "VBN",
                        VerbForm::PastOrParticiple => {
                            if governed_by_aux(&classes, idx) {
                                "VBN"
                            } else {
                                "VBD"
                            }
                        }
                    };
                    ("VERB", tag)
                }
                WordClass::Other => noun_tag(text, idx),
            };

            let lemma = match &classes[idx] {
                WordClass::Punct | WordClass::Num => text.to_string(),
                WordClass::Pronoun(_) | WordClass::Possessive => lower.clone(),
                _ => lemma_of(lower),
            };

            TokenAnnotation {
                text: text.to_string(),
                lemma,
                pos: pos.to_string(),
                tag: tag.to_string(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAnalyzer;

impl RuleBasedAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl LinguisticAnalyzer for RuleBasedAnalyzer {
    async fn split_sentences(&self, text: &str) -> Result<Vec<String>, AnalyzerError> {
        Ok(split_sentences_by_rules(text))
    }

    async fn lemmatize(&self, tokens: &[String]) -> Result<Vec<String>, AnalyzerError> {
        Ok(tokens.iter().map(|t| lemma_of(t)).collect())
    }

    async fn annotate(&self, sentence: &str) -> Result<Vec<TokenAnnotation>, AnalyzerError> {
        Ok(annotate_by_rules(sentence))
    }
}
