//! 알림 판정 -- 판정문에 트리거 키워드가 있는지 확인합니다.
//!
//! 대소문자를 무시하는 부분 문자열 검색입니다. 분류기가 아닌 거친 휴리스틱이며,
//! 판정문은 신뢰할 수 없는 자유 텍스트로 취급하여 구조적으로 해석하지 않습니다.

use crate::analysis::Verdict;

/// 트리거 키워드 기반 알림 판정
#[derive(Debug, Clone)]
pub struct AlertDecision {
    /// 소문자로 정규화된 키워드
    terms: Vec<String>,
}

impl AlertDecision {
    /// 키워드 목록으로 판정기를 생성합니다. 공백 키워드는 무시합니다.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// 판정문이 알림 대상인지 확인합니다.
    pub fn decide(&self, verdict: &Verdict) -> bool {
        self.matched_term(verdict).is_some()
    }

    /// 판정문에서 처음 일치한 키워드를 반환합니다.
    pub fn matched_term(&self, verdict: &Verdict) -> Option<&str> {
        let haystack = verdict.as_str().to_lowercase();
        self.terms
            .iter()
            .find(|term| haystack.contains(term.as_str()))
            .map(String::as_str)
    }

    /// 정규화된 키워드 목록
    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl Default for AlertDecision {
    fn default() -> Self {
        Self::new(["suspicious", "threat"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_terms_fire_case_insensitively() {
        let decision = AlertDecision::default();
        assert!(decision.decide(&Verdict::new("SUSPICIOUS login from 10.0.0.1")));
        assert!(decision.decide(&Verdict::new("Potential Threat identified")));
        assert!(!decision.decide(&Verdict::new("Nothing unusual observed.")));
    }

    #[test]
    fn substring_matches_count() {
        // 부정문도 일치함 (의도된 거친 휴리스틱)
        let decision = AlertDecision::default();
        assert!(decision.decide(&Verdict::new("No threats detected.")));
    }

    #[test]
    fn matched_term_returns_first_configured_match() {
        let decision = AlertDecision::default();
        let verdict = Verdict::new("threat and suspicious activity");
        assert_eq!(decision.matched_term(&verdict), Some("suspicious"));
    }

    #[test]
    fn custom_terms_are_normalized() {
        let decision = AlertDecision::new(["  Malware ", "", "C2"]);
        assert_eq!(decision.terms(), &["malware".to_owned(), "c2".to_owned()]);
        assert!(decision.decide(&Verdict::new("beacon to c2 server")));
        assert!(!decision.decide(&Verdict::new("suspicious")));
    }

    #[test]
    fn no_terms_never_fires() {
        let decision = AlertDecision::new(Vec::<String>::new());
        assert!(!decision.decide(&Verdict::new("threat")));
    }
}
