//! 도메인 문자열에서 서비스 정보를 추론하는 헬퍼

/// `host[:port]` 형식을 주소와 포트로 나눕니다.
///
/// 포트가 없으면 `0`을, 형식이 잘못되었으면 빈 주소와 `0`을 반환합니다.
pub fn address_and_port(addr: &str) -> (String, u16) {
    if addr.starts_with('[') && addr.ends_with(']') {
        return (addr.to_owned(), 0);
    }

    let Some((host, port)) = addr.rsplit_once(':') else {
        return (addr.to_owned(), 0);
    };

    let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(inner) => inner,
        None if host.contains(':') => return (String::new(), 0),
        None => host,
    };

    match port.parse::<u16>() {
        Ok(port) => (host.to_owned(), port),
        Err(_) => (String::new(), 0),
    }
}

/// Kubernetes 서비스 DNS 이름에서 서비스 이름과 네임스페이스를 추출합니다.
///
/// - `<svc>[.<sub>].<ns>.svc[.cluster.local]`
/// - `<svc>.svc[.cluster.local]` (네임스페이스는 빈 문자열)
/// - `<svc>.<ns>`
///
/// pod DNS 이름이나 외부 이름이면 `None`을 반환합니다.
pub fn extract_k8s_service_name_and_namespace(host: &str) -> Option<(String, String)> {
    let trimmed = host.strip_suffix(".cluster.local").unwrap_or(host);

    if let Some(rest) = trimmed.strip_suffix(".svc") {
        if rest.is_empty() {
            return None;
        }
        return Some(match rest.rsplit_once('.') {
            Some((name, ns)) => (name.to_owned(), ns.to_owned()),
            None => (rest.to_owned(), String::new()),
        });
    }

    if trimmed.len() != host.len() {
        return None;
    }

    match host.split_once('.') {
        Some((name, ns)) if !name.is_empty() && !ns.is_empty() && !ns.contains('.') => {
            Some((name.to_owned(), ns.to_owned()))
        }
        _ => None,
    }
}
