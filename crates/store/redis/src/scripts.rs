/// Lua script for appending to a payload within a bounded window.
///
/// KEYS\[1\] = the data key
/// ARGV\[1\] = chunk to append
/// ARGV\[2\] = maximum payload size in bytes
///
/// Keeps the most recent `ARGV[2]` bytes when the result would be larger,
/// preserving the key's TTL. Returns the new length, or -1 if the key does
/// not exist.
pub const APPEND_BOUNDED: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return -1
end
local chunk = ARGV[1]
local max = tonumber(ARGV[2])
local clen = string.len(chunk)
if clen >= max then
    redis.call('SET', KEYS[1], string.sub(chunk, clen - max + 1), 'KEEPTTL')
    return max
end
local overflow = redis.call('STRLEN', KEYS[1]) + clen - max
if overflow > 0 then
    local kept = redis.call('GETRANGE', KEYS[1], overflow, -1)
    redis.call('SET', KEYS[1], kept .. chunk, 'KEEPTTL')
    return max
end
return redis.call('APPEND', KEYS[1], chunk)
";

/// Lua script for soft-deleting a set of keys.
///
/// KEYS = pairs of (live key, deleted key)
/// ARGV\[1\] = grace TTL in seconds
///
/// Each live key that exists is renamed to its deleted form and given the
/// grace TTL. Returns the number of keys moved.
pub const SOFT_DELETE: &str = r"
local grace = tonumber(ARGV[1])
local moved = 0
for i = 1, #KEYS, 2 do
    if redis.call('EXISTS', KEYS[i]) == 1 then
        redis.call('RENAME', KEYS[i], KEYS[i + 1])
        redis.call('EXPIRE', KEYS[i + 1], grace)
        moved = moved + 1
    end
end
return moved
";

/// Lua script for restoring a soft-deleted gob.
///
/// KEYS\[1\] = data key
/// KEYS\[2\] = metadata key
/// KEYS\[3\] = token key
/// KEYS\[4\] = deleted data key
/// KEYS\[5\] = deleted metadata key
/// KEYS\[6\] = deleted token key
///
/// Returns the payload length on success, or -1 if there is nothing to
/// restore or a live key is in the way. The caller re-arms the TTL.
pub const RESTORE: &str = r"
if redis.call('EXISTS', KEYS[4]) == 0 or redis.call('EXISTS', KEYS[5]) == 0 then
    return -1
end
if redis.call('EXISTS', KEYS[1], KEYS[2], KEYS[3]) > 0 then
    return -1
end
redis.call('RENAME', KEYS[4], KEYS[1])
redis.call('RENAME', KEYS[5], KEYS[2])
if redis.call('EXISTS', KEYS[6]) == 1 then
    redis.call('RENAME', KEYS[6], KEYS[3])
end
return redis.call('STRLEN', KEYS[1])
";

/// Lua script for adding an id to a horde.
///
/// KEYS\[1\] = horde list key
/// KEYS\[2\] = horde timestamp hash key
/// KEYS\[3\] = id-to-horde key
/// KEYS\[4\] = data key of the gob
/// ARGV\[1\] = gob id
/// ARGV\[2\] = horde name
/// ARGV\[3\] = creation timestamp (RFC 3339)
///
/// An earlier occurrence of the id is dropped before it is pushed to the
/// front. The id-to-horde key takes the remaining lifetime of the data key,
/// if it has one.
pub const ADD_TO_HORDE: &str = r"
redis.call('LREM', KEYS[1], 0, ARGV[1])
redis.call('LPUSH', KEYS[1], ARGV[1])
redis.call('HSET', KEYS[2], ARGV[1], ARGV[3])
local ttl = redis.call('PTTL', KEYS[4])
if ttl > 0 then
    redis.call('SET', KEYS[3], ARGV[2], 'PX', ttl)
else
    redis.call('SET', KEYS[3], ARGV[2])
end
return 1
";
