//! 레이블 집계 규칙
//!
//! 같은 집계 키로 병합되는 레코드들의 레이블은 교집합으로 합칩니다.
//! 양쪽에 같은 값으로 존재하는 키만 남고, 내부 예약 접두어를 가진 키는 항상 제거됩니다.

use sluice_core::types::Labels;

/// 내부 전용 레이블 접두어
///
/// 이 접두어로 시작하는 키는 출력 레코드에 절대 포함되지 않습니다.
pub const RESERVED_LABEL_PREFIX: &str = "sluice.io/";

/// 예약 접두어를 가진 키인지 확인합니다.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(RESERVED_LABEL_PREFIX)
}

/// 예약 키를 제거한 레이블을 반환합니다.
pub fn strip_reserved(labels: &Labels) -> Labels {
    labels
        .iter()
        .filter(|(k, _)| !is_reserved(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// `target`을 `other`와의 교집합으로 갱신합니다.
pub fn intersect_in_place(target: &mut Labels, other: &Labels) {
    target.retain(|k, v| !is_reserved(k) && other.get(k) == Some(v));
}

/// 두 레이블 맵의 교집합을 새로 만들어 반환합니다.
pub fn intersect(a: &Labels, b: &Labels) -> Labels {
    let mut out = a.clone();
    intersect_in_place(&mut out, b);
    out
}
